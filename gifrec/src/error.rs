// error.rs
//
// Copyright (c) 2026  The gifrec developers
//
use std::fmt;
use std::io;
use std::num::TryFromIntError;

/// Errors encountered while recording or encoding
#[derive(Debug)]
pub enum Error {
    /// A wrapped I/O error.
    Io(io::Error),
    /// Integer out of bounds.
    TryFromInt(TryFromIntError),
    /// Raster larger than 65535 pixels in either direction, or a pixel
    /// buffer which does not match its dimensions.
    InvalidRasterDimensions,
    /// Frame larger than the screen size.
    InvalidFrameDimensions,
    /// LZW dictionary size leaves no room for clear / end codes.
    InvalidDictionarySize(u16),
    /// [Quality](enum.Quality.html) level outside of 1 to 8.
    InvalidQuality(u8),
    /// Compressed LZW data invalid or corrupt
    InvalidLzwData,
    /// Color index outside of the LZW dictionary.
    InvalidColorIndex,
    /// Octree descent did not end on a leaf.
    MalformedOctree,
    /// Quantized color missing from the palette.
    ColorNotFound,
    /// Encoder already wrote the trailer.
    EncoderFinished,
    /// Encoding worker thread panicked.
    WorkerPanicked,
}

/// Gifrec result type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if an error only affects the frame being encoded.
    ///
    /// Sink errors end the recording; anything else skips one frame.
    pub fn is_frame_local(&self) -> bool {
        !matches!(
            self,
            Error::Io(_) | Error::EncoderFinished | Error::WorkerPanicked
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(fmt),
            Error::TryFromInt(err) => err.fmt(fmt),
            _ => fmt::Debug::fmt(self, fmt),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::TryFromInt(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<TryFromIntError> for Error {
    fn from(err: TryFromIntError) -> Self {
        Error::TryFromInt(err)
    }
}
