// lib.rs      gifrec crate.
//
// Copyright (c) 2026  The gifrec developers
//
//! A library for recording animated GIF files.
//!
//! True color frames are pushed into a [Recorder], which quantizes each one
//! to a local palette on a worker thread and streams it into the file.
//!
//! [Recorder]: struct.Recorder.html
#![forbid(unsafe_code)]

pub mod block;
mod buffer;
mod encode;
mod error;
pub mod lzw;
mod private;
pub mod quantize;
mod session;

pub use crate::buffer::FrameBuffer;
pub use crate::encode::{BlockEnc, FrameEnc, RasterEnc};
pub use crate::error::{Error, Result};
pub use crate::lzw::bit_length;
pub use crate::private::{Encoder, Frame, IndexedFrame, Quality};
pub use crate::session::{
    Progress, Recorder, Summary, format_elapsed, format_size,
};
