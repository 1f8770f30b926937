// encode.rs
//
// Copyright (c) 2026  The gifrec developers
//
//! GIF file encoding
use crate::block::*;
use crate::error::{Error, Result};
use crate::private::{IndexedFrame, check_dimensions};
use crate::quantize::Quantizer;
use crate::Frame;
use log::{debug, trace};
use pix::rgb::Rgb;
use std::io::Write;

/// Encoder for writing [Block]s into a GIF file.
///
/// Build with Encoder.[into_block_enc].
///
/// [Block]: block/enum.Block.html
/// [into_block_enc]: struct.Encoder.html#method.into_block_enc
pub struct BlockEnc<W: Write> {
    /// Writer for blocks
    writer: W,
    /// Scratch buffer for one block
    buf: Vec<u8>,
    /// Total bytes written
    bytes_written: u64,
}

/// Container state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Sink open, nothing written
    Started,
    /// Preamble written
    Writing,
    /// Trailer written
    Finished,
}

/// Encoder for writing [IndexedFrame]s into a GIF file.
///
/// Build with Encoder.[into_frame_enc].
///
/// [IndexedFrame]: struct.IndexedFrame.html
/// [into_frame_enc]: struct.Encoder.html#method.into_frame_enc
pub struct FrameEnc<W: Write> {
    /// Block encoder
    block_enc: BlockEnc<W>,
    /// Container state
    state: State,
    /// Screen size, fixed by configuration or the first frame
    screen_size: Option<(u16, u16)>,
    /// Animation loop count
    loop_count: Option<u16>,
    /// Disposal method for every frame
    disposal_method: DisposalMethod,
    /// Transparent color index
    transparent_color: Option<u8>,
    /// Number of frames written
    frames_written: u64,
}

/// Encoder for writing true color [Frame]s into a GIF file.
///
/// Each frame is quantized to its own local palette.
///
/// Build with Encoder.[into_raster_enc].
///
/// [Frame]: struct.Frame.html
/// [into_raster_enc]: struct.Encoder.html#method.into_raster_enc
pub struct RasterEnc<W: Write> {
    /// Frame encoder
    frame_enc: FrameEnc<W>,
    /// Color quantizer
    quantizer: Quantizer,
}

impl<W: Write> BlockEnc<W> {
    /// Create a new GIF block encoder.
    pub(crate) fn new(writer: W) -> Self {
        BlockEnc {
            writer,
            buf: Vec::with_capacity(1024),
            bytes_written: 0,
        }
    }

    /// Encode one block.
    pub fn encode<B>(&mut self, block: B) -> Result<()>
    where
        B: Into<Block>,
    {
        use crate::block::Block::*;
        let buf = &mut self.buf;
        buf.clear();
        match block.into() {
            Header(b) => b.format(buf),
            LogicalScreenDesc(b) => b.format(buf),
            Application(b) => b.format(buf),
            GraphicControl(b) => b.format(buf),
            ImageDesc(b) => b.format(buf),
            LocalColorTable(b) => b.format(buf),
            ImageData(b) => b.format(buf),
            Trailer(b) => b.format(buf),
        }
        self.writer.write_all(buf)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }

    /// Flush the writer
    pub fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }

    /// Get the total number of bytes written
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Header {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"GIF");
        buf.extend_from_slice(&self.version());
    }
}

impl LogicalScreenDesc {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.screen_width().to_le_bytes());
        buf.extend_from_slice(&self.screen_height().to_le_bytes());
        buf.push(self.flags());
        buf.push(0); // background color index
        buf.push(0); // pixel aspect ratio
    }
}

impl Application {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(BlockCode::Extension_.signature());
        buf.push(ExtensionCode::Application_.into());
        for data in self.app_data() {
            format_sub_block(buf, data);
        }
        buf.push(0); // block terminator
    }
}

impl GraphicControl {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(BlockCode::Extension_.signature());
        buf.push(ExtensionCode::GraphicControl_.into());
        buf.push(4); // block size
        buf.push(self.flags());
        buf.extend_from_slice(&self.delay_time_cs().to_le_bytes());
        buf.push(self.transparent_color_idx());
        buf.push(0); // block terminator
    }
}

impl ImageDesc {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(BlockCode::ImageDesc_.signature());
        buf.extend_from_slice(&[0; 4]); // left, top
        buf.extend_from_slice(&self.width().to_le_bytes());
        buf.extend_from_slice(&self.height().to_le_bytes());
        buf.push(self.flags());
    }
}

impl LocalColorTable {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.colors());
    }
}

impl ImageData {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.push(self.min_code_size());
        for data in self.sub_blocks() {
            format_sub_block(buf, data);
        }
        buf.push(0); // block terminator
    }
}

impl Trailer {
    fn format(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(BlockCode::Trailer_.signature());
    }
}

/// Format one length-prefixed sub-block (at most 255 bytes)
fn format_sub_block(buf: &mut Vec<u8>, data: &[u8]) {
    let len = data.len().min(SUB_BLOCK_LEN);
    buf.push(len as u8);
    buf.extend_from_slice(&data[..len]);
}

impl<W: Write> FrameEnc<W> {
    /// Create a new GIF frame encoder.
    pub(crate) fn new(block_enc: BlockEnc<W>) -> Self {
        FrameEnc {
            block_enc,
            state: State::Started,
            screen_size: None,
            loop_count: None,
            disposal_method: DisposalMethod::default(),
            transparent_color: None,
            frames_written: 0,
        }
    }

    /// Set the screen size
    pub(crate) fn with_screen_size(mut self, width: u16, height: u16) -> Self {
        self.screen_size = Some((width, height));
        self
    }

    /// Set the loop count
    pub(crate) fn with_loop_count(mut self, loop_count: Option<u16>) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Set the disposal method
    pub(crate) fn with_disposal_method(
        mut self,
        method: DisposalMethod,
    ) -> Self {
        self.disposal_method = method;
        self
    }

    /// Set the transparent color index
    pub(crate) fn with_transparent_color(mut self, idx: Option<u8>) -> Self {
        self.transparent_color = idx;
        self
    }

    /// Encode an indexed frame.
    ///
    /// The first frame also writes the file preamble.  A frame which cannot
    /// be encoded writes nothing.
    pub fn encode_indexed(&mut self, frame: &IndexedFrame) -> Result<()> {
        if self.state == State::Finished {
            return Err(Error::EncoderFinished);
        }
        let raster = frame.raster();
        let (width, height) =
            check_dimensions(raster.width(), raster.height())?;
        let (screen_width, screen_height) =
            self.screen_size.unwrap_or((width, height));
        if width > screen_width || height > screen_height {
            return Err(Error::InvalidFrameDimensions);
        }
        let palette = frame.palette();
        let tbl = ColorTableConfig::new(u16::try_from(palette.len())?);
        let mut colors = Vec::with_capacity(tbl.size_bytes());
        for i in 0..palette.len() {
            if let Some(clr) = palette.entry(i) {
                colors.push(u8::from(Rgb::red(clr)));
                colors.push(u8::from(Rgb::green(clr)));
                colors.push(u8::from(Rgb::blue(clr)));
            }
        }
        let image_data =
            ImageData::compress(raster.as_u8_slice(), tbl.min_code_size())?;
        trace!(
            "frame {}: {} colors, {} bytes compressed",
            self.frames_written,
            palette.len(),
            image_data.data().len()
        );
        self.screen_size = Some((screen_width, screen_height));
        if self.state == State::Started {
            self.encode_preamble()?;
        }
        let mut control = GraphicControl::default();
        control.set_disposal_method(self.disposal_method);
        control.set_delay_time_cs(frame.delay_time_cs());
        control.set_transparent_color(self.transparent_color);
        self.block_enc.encode(control)?;
        self.block_enc.encode(
            ImageDesc::default()
                .with_width(width)
                .with_height(height)
                .with_color_table_config(&tbl),
        )?;
        self.block_enc
            .encode(LocalColorTable::with_colors(&colors, &tbl))?;
        self.block_enc.encode(image_data)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Encode the file preamble
    fn encode_preamble(&mut self) -> Result<()> {
        let (width, height) = self.screen_size.unwrap_or_default();
        debug!("screen size {}x{}", width, height);
        self.block_enc.encode(Header::default())?;
        self.block_enc.encode(
            LogicalScreenDesc::default()
                .with_screen_width(width)
                .with_screen_height(height)
                .with_color_resolution(8),
        )?;
        if let Some(loop_count) = self.loop_count {
            self.block_enc.encode(Application::with_loop_count(loop_count))?;
        }
        self.state = State::Writing;
        Ok(())
    }

    /// Finish the file by writing the trailer.
    ///
    /// If no frame was written, the preamble is written first.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            State::Finished => return Err(Error::EncoderFinished),
            State::Started => self.encode_preamble()?,
            State::Writing => (),
        }
        self.block_enc.encode(Trailer::default())?;
        self.block_enc.flush()?;
        self.state = State::Finished;
        debug!(
            "finished: {} frames, {} bytes",
            self.frames_written,
            self.block_enc.bytes_written()
        );
        Ok(())
    }

    /// Check if the trailer has been written
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Get the number of frames written
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Get the total number of bytes written
    pub fn bytes_written(&self) -> u64 {
        self.block_enc.bytes_written()
    }
}

impl<W: Write> RasterEnc<W> {
    /// Create a new GIF raster encoder.
    pub(crate) fn new(frame_enc: FrameEnc<W>, quantizer: Quantizer) -> Self {
        RasterEnc {
            frame_enc,
            quantizer,
        }
    }

    /// Quantize and encode a true color frame.
    pub fn encode_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.frame_enc.is_finished() {
            return Err(Error::EncoderFinished);
        }
        let (raster, palette) = self.quantizer.quantize(frame.raster())?;
        let indexed = IndexedFrame::new(raster, palette, frame.delay_time_cs());
        self.frame_enc.encode_indexed(&indexed)
    }

    /// Finish the file by writing the trailer.
    pub fn finish(&mut self) -> Result<()> {
        self.frame_enc.finish()
    }

    /// Check if the trailer has been written
    pub fn is_finished(&self) -> bool {
        self.frame_enc.is_finished()
    }

    /// Get the quantizer
    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    /// Get the number of frames written
    pub fn frames_written(&self) -> u64 {
        self.frame_enc.frames_written()
    }

    /// Get the total number of bytes written
    pub fn bytes_written(&self) -> u64 {
        self.frame_enc.bytes_written()
    }
}
