// private.rs
//
// Copyright (c) 2026  The gifrec developers
//
//! Private module for top-level items
use crate::{
    Error, Result,
    block::DisposalMethod,
    encode::{BlockEnc, FrameEnc, RasterEnc},
    quantize::Quantizer,
};
use pix::{Palette, Raster, gray::Gray8, rgb::SRgb8};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Color quantization quality.
///
/// Each level is the depth of the octree used to group similar colors.
/// Higher levels keep more shades apart, but take longer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Quality {
    Lowest = 1,
    Low = 2,
    Lower = 3,
    #[default]
    Normal = 4,
    Higher = 5,
    High = 6,
    VeryHigh = 7,
    Highest = 8,
}

impl Quality {
    /// Get the octree depth
    pub fn levels(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Quality {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        use self::Quality::*;
        match level {
            1 => Ok(Lowest),
            2 => Ok(Low),
            3 => Ok(Lower),
            4 => Ok(Normal),
            5 => Ok(Higher),
            6 => Ok(High),
            7 => Ok(VeryHigh),
            8 => Ok(Highest),
            _ => Err(Error::InvalidQuality(level)),
        }
    }
}

/// Check raster dimensions, returning them as 16-bit values
pub(crate) fn check_dimensions(width: u32, height: u32) -> Result<(u16, u16)> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(Error::InvalidRasterDimensions),
    }
}

/// One true color frame of a recording.
pub struct Frame {
    /// Pixels of the frame
    raster: Raster<SRgb8>,
    /// Display time in centiseconds
    delay_time_cs: u16,
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        Frame {
            raster: Raster::with_raster(&self.raster),
            delay_time_cs: self.delay_time_cs,
        }
    }
}

impl Frame {
    /// Create a frame from a raster.
    ///
    /// The raster must be between 1 and 65535 pixels in each direction.
    pub fn new(raster: Raster<SRgb8>, delay_time_cs: u16) -> Result<Self> {
        check_dimensions(raster.width(), raster.height())?;
        Ok(Frame {
            raster,
            delay_time_cs,
        })
    }

    /// Create a frame from a packed RGB buffer (3 bytes per pixel, row-major)
    pub fn with_rgb_buffer(
        width: u32,
        height: u32,
        buffer: Vec<u8>,
        delay_time_cs: u16,
    ) -> Result<Self> {
        let (w, h) = check_dimensions(width, height)?;
        if buffer.len() != usize::from(w) * usize::from(h) * 3 {
            return Err(Error::InvalidRasterDimensions);
        }
        Self::new(Raster::with_u8_buffer(width, height, buffer), delay_time_cs)
    }

    /// Get the delay for a frame rate, in centiseconds
    pub fn delay_for_rate(fps: u16) -> u16 {
        100 / fps.max(1)
    }

    /// Get the raster
    pub fn raster(&self) -> &Raster<SRgb8> {
        &self.raster
    }

    /// Get the width in pixels
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    /// Get the height in pixels
    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Get the delay time in centiseconds
    pub fn delay_time_cs(&self) -> u16 {
        self.delay_time_cs
    }
}

/// A frame reduced to palette indices.
pub struct IndexedFrame {
    /// Palette index of each pixel
    raster: Raster<Gray8>,
    /// Colors used by the frame
    palette: Palette,
    /// Display time in centiseconds
    delay_time_cs: u16,
}

impl IndexedFrame {
    /// Create an indexed frame
    pub fn new(
        raster: Raster<Gray8>,
        palette: Palette,
        delay_time_cs: u16,
    ) -> Self {
        IndexedFrame {
            raster,
            palette,
            delay_time_cs,
        }
    }

    /// Get the index raster
    pub fn raster(&self) -> &Raster<Gray8> {
        &self.raster
    }

    /// Get the palette
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Get the delay time in centiseconds
    pub fn delay_time_cs(&self) -> u16 {
        self.delay_time_cs
    }
}

/// Animated GIF encoder
///
/// Configure with the `with_` methods, then convert into one of three
/// encoders:
/// * [into_raster_enc] for true color [Frame]s
/// * [into_frame_enc] for [IndexedFrame]s
/// * [into_block_enc] for low-level [Block]s
///
/// ## Encoding Example
/// ```
/// use gifrec::{Encoder, Frame, Quality};
///
/// # fn main() -> Result<(), gifrec::Error> {
/// let mut gif = Vec::new();
/// let mut enc = Encoder::new(&mut gif)
///     .with_quality(Quality::High)
///     .with_loop_count(Some(0))
///     .into_raster_enc();
/// let rgb = [255, 0, 0, 0, 0, 255, 0, 255, 0, 255, 255, 255];
/// let frame = Frame::with_rgb_buffer(2, 2, rgb.to_vec(), 10)?;
/// enc.encode_frame(&frame)?;
/// enc.finish()?;
/// assert_eq!(&gif[..6], b"GIF89a");
/// assert_eq!(gif.last(), Some(&0x3B));
/// # Ok(())
/// # }
/// ```
///
/// [Block]: block/enum.Block.html
/// [Frame]: struct.Frame.html
/// [IndexedFrame]: struct.IndexedFrame.html
/// [into_block_enc]: struct.Encoder.html#method.into_block_enc
/// [into_frame_enc]: struct.Encoder.html#method.into_frame_enc
/// [into_raster_enc]: struct.Encoder.html#method.into_raster_enc
pub struct Encoder<W: Write> {
    /// Writer for output data
    writer: W,
    /// Quantization quality
    quality: Quality,
    /// Animation loop count
    loop_count: Option<u16>,
    /// Disposal method for every frame
    disposal_method: DisposalMethod,
    /// Transparent color index
    transparent_color: Option<u8>,
    /// Fixed screen size
    screen_size: Option<(u16, u16)>,
}

impl Encoder<BufWriter<File>> {
    /// Create an encoder writing to a new file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> Encoder<W> {
    /// Create a new GIF encoder.
    pub fn new(writer: W) -> Self {
        Encoder {
            writer,
            quality: Quality::default(),
            loop_count: None,
            disposal_method: DisposalMethod::default(),
            transparent_color: None,
            screen_size: None,
        }
    }

    /// Set the quantization quality
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Set the loop count.
    ///
    /// With `Some(0)`, the animation loops forever.  With `None`, no
    /// looping extension is written.
    pub fn with_loop_count(mut self, loop_count: Option<u16>) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Set the disposal method for all frames
    pub fn with_disposal_method(mut self, method: DisposalMethod) -> Self {
        self.disposal_method = method;
        self
    }

    /// Set the transparent color index for all frames
    pub fn with_transparent_color(mut self, idx: Option<u8>) -> Self {
        self.transparent_color = idx;
        self
    }

    /// Set the screen size.
    ///
    /// By default, the size of the first frame is used.
    pub fn with_screen_size(mut self, width: u16, height: u16) -> Self {
        self.screen_size = Some((width, height));
        self
    }

    /// Convert into a block encoder.
    pub fn into_block_enc(self) -> BlockEnc<W> {
        BlockEnc::new(self.writer)
    }

    /// Convert into a frame encoder.
    pub fn into_frame_enc(self) -> FrameEnc<W> {
        let mut enc = FrameEnc::new(BlockEnc::new(self.writer))
            .with_loop_count(self.loop_count)
            .with_disposal_method(self.disposal_method)
            .with_transparent_color(self.transparent_color);
        if let Some((width, height)) = self.screen_size {
            enc = enc.with_screen_size(width, height);
        }
        enc
    }

    /// Convert into a raster encoder.
    pub fn into_raster_enc(self) -> RasterEnc<W> {
        let quantizer = Quantizer::new(self.quality);
        RasterEnc::new(self.into_frame_enc(), quantizer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quality_levels() {
        assert_eq!(Quality::default(), Quality::Normal);
        assert_eq!(Quality::default().levels(), 4);
        assert_eq!(Quality::Highest.levels(), 8);
        for level in 1..=8 {
            assert_eq!(Quality::try_from(level).unwrap().levels(), level);
        }
        assert!(matches!(Quality::try_from(0), Err(Error::InvalidQuality(0))));
        assert!(matches!(Quality::try_from(9), Err(Error::InvalidQuality(9))));
    }

    #[test]
    fn frame_dimensions() {
        assert!(Frame::with_rgb_buffer(2, 2, vec![0; 12], 5).is_ok());
        assert!(matches!(
            Frame::with_rgb_buffer(2, 2, vec![0; 11], 5),
            Err(Error::InvalidRasterDimensions)
        ));
        assert!(matches!(
            Frame::with_rgb_buffer(0, 2, vec![], 5),
            Err(Error::InvalidRasterDimensions)
        ));
        assert!(matches!(
            Frame::with_rgb_buffer(65536, 1, vec![0; 65536 * 3], 5),
            Err(Error::InvalidRasterDimensions)
        ));
    }

    #[test]
    fn frame_rate() {
        assert_eq!(Frame::delay_for_rate(10), 10);
        assert_eq!(Frame::delay_for_rate(15), 6);
        assert_eq!(Frame::delay_for_rate(30), 3);
        assert_eq!(Frame::delay_for_rate(0), 100);
    }

    #[test]
    fn frame_clone() {
        let frame = Frame::with_rgb_buffer(1, 2, vec![1, 2, 3, 4, 5, 6], 7)
            .unwrap();
        let copy = frame.clone();
        assert_eq!(copy.raster().as_u8_slice(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(copy.delay_time_cs(), 7);
        assert_eq!((copy.width(), copy.height()), (1, 2));
    }
}
