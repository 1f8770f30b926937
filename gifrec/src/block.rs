// block.rs
//
// Copyright (c) 2026  The gifrec developers
//
//! GIF file blocks written by the recorder
use crate::error::Result;
use crate::lzw::{bit_length, Compressor};

/// Color channels per table entry
const CHANNELS: usize = 3;

/// Maximum length of one data sub-block
pub const SUB_BLOCK_LEN: usize = 0xFF;

/// Local color table configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTableConfig {
    table_len: usize, // power of 2, 2...256
}

impl ColorTableConfig {
    /// Create a new color table configuration.
    ///
    /// The table length is rounded up to a power of 2, from 2 to 256.
    pub fn new(table_len: u16) -> Self {
        let table_len =
            usize::from(table_len).max(2).next_power_of_two().min(256);
        ColorTableConfig { table_len }
    }

    /// Get the number of entries
    pub fn table_len(&self) -> usize {
        self.table_len
    }

    /// Get the size field: log2(table length) - 1
    pub(crate) fn len_bits(&self) -> u8 {
        bit_length(self.table_len as u32 - 1) - 1
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.table_len * CHANNELS
    }

    /// Get the LZW minimum code size for indices into this table
    pub fn min_code_size(&self) -> u8 {
        (self.len_bits() + 1).max(2)
    }
}

/// Disposal method for a frame
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum DisposalMethod {
    /// No disposal specified
    #[default]
    NoAction,
    /// Leave the frame in place
    Keep,
    /// Restore to background color
    Background,
    /// Restore to previous frame
    Previous,
}

impl From<DisposalMethod> for u8 {
    fn from(d: DisposalMethod) -> Self {
        use self::DisposalMethod::*;
        match d {
            NoAction => 0,
            Keep => 1,
            Background => 2,
            Previous => 3,
        }
    }
}

/// Block introducer codes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum BlockCode {
    Extension_,
    ImageDesc_,
    Trailer_,
}

impl BlockCode {
    /// Get the block signature
    pub fn signature(&self) -> &'static [u8] {
        use self::BlockCode::*;
        match self {
            ImageDesc_ => b",", // (0x2C) Image separator
            Extension_ => b"!", // (0x21) Extension introducer
            Trailer_ => b";",   // (0x3B) GIF trailer
        }
    }
}

/// Extension labels
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ExtensionCode {
    GraphicControl_,
    Application_,
}

impl From<ExtensionCode> for u8 {
    fn from(t: ExtensionCode) -> Self {
        use self::ExtensionCode::*;
        match t {
            GraphicControl_ => 0xF9,
            Application_ => 0xFF,
        }
    }
}

/// Header block (signature and version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    version: [u8; 3],
}

impl Default for Header {
    fn default() -> Self {
        Header { version: *b"89a" }
    }
}

impl Header {
    /// Get the version
    pub fn version(&self) -> [u8; 3] {
        self.version
    }
}

/// Logical screen descriptor block.
///
/// No global color table is written, so the background color index and
/// pixel aspect ratio are always zero.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LogicalScreenDesc {
    screen_width: u16,
    screen_height: u16,
    flags: u8,
}

impl LogicalScreenDesc {
    const COLOR_RESOLUTION: u8 = 0b0111_0000;

    /// Set the screen width
    pub fn with_screen_width(mut self, screen_width: u16) -> Self {
        self.screen_width = screen_width;
        self
    }

    /// Get the screen width
    pub fn screen_width(&self) -> u16 {
        self.screen_width
    }

    /// Set the screen height
    pub fn with_screen_height(mut self, screen_height: u16) -> Self {
        self.screen_height = screen_height;
        self
    }

    /// Get the screen height
    pub fn screen_height(&self) -> u16 {
        self.screen_height
    }

    /// Set the color resolution, in bits per primary color (1 to 8)
    pub fn with_color_resolution(mut self, bits: u8) -> Self {
        let res = (bits.clamp(1, 8) - 1) << 4;
        self.flags = (self.flags & !Self::COLOR_RESOLUTION) | res;
        self
    }

    /// Get the packed flags
    pub fn flags(&self) -> u8 {
        self.flags
    }
}

/// Application extension block
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Application {
    app_data: Vec<Vec<u8>>, // sequence of sub-blocks
}

impl Application {
    /// Create a NETSCAPE2.0 looping extension (zero loops forever)
    pub fn with_loop_count(loop_count: u16) -> Self {
        let [lo, hi] = loop_count.to_le_bytes();
        let app_data = vec![b"NETSCAPE2.0".to_vec(), vec![1, lo, hi]];
        Application { app_data }
    }

    /// Get the application data sub-blocks
    pub fn app_data(&self) -> &[Vec<u8>] {
        &self.app_data
    }
}

/// Graphic control extension block
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GraphicControl {
    flags: u8,
    delay_time_cs: u16, // delay in centiseconds (hundredths of a second)
    transparent_color_idx: u8,
}

impl GraphicControl {
    const DISPOSAL_METHOD: u8 = 0b0001_1100;
    const TRANSPARENT_COLOR: u8 = 0b0000_0001;

    /// Get the packed flags
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Set the disposal method
    pub fn set_disposal_method(&mut self, disposal_method: DisposalMethod) {
        let d: u8 = disposal_method.into();
        self.flags = (self.flags & !Self::DISPOSAL_METHOD) | (d << 2);
    }

    /// Get the delay time in centiseconds
    pub fn delay_time_cs(&self) -> u16 {
        self.delay_time_cs
    }

    /// Set the delay time in centiseconds
    pub fn set_delay_time_cs(&mut self, delay_time_cs: u16) {
        self.delay_time_cs = delay_time_cs;
    }

    /// Get the transparent color index (0 when not transparent)
    pub fn transparent_color_idx(&self) -> u8 {
        self.transparent_color_idx
    }

    /// Set the transparent color index
    pub fn set_transparent_color(&mut self, transparent_color: Option<u8>) {
        match transparent_color {
            Some(t) => {
                self.flags |= Self::TRANSPARENT_COLOR;
                self.transparent_color_idx = t;
            }
            None => {
                self.flags &= !Self::TRANSPARENT_COLOR;
                self.transparent_color_idx = 0;
            }
        }
    }
}

/// Image descriptor block.
///
/// Images are always placed at the top-left corner of the screen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    width: u16,
    height: u16,
    flags: u8,
}

impl ImageDesc {
    const COLOR_TABLE_PRESENT: u8 = 0b1000_0000;
    const COLOR_TABLE_SIZE: u8 = 0b0000_0111;

    /// Set the width
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }

    /// Get the width
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Set the height
    pub fn with_height(mut self, height: u16) -> Self {
        self.height = height;
        self
    }

    /// Get the height
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Set the local color table configuration
    pub fn with_color_table_config(mut self, tbl: &ColorTableConfig) -> Self {
        self.flags = Self::COLOR_TABLE_PRESENT
            | (tbl.len_bits() & Self::COLOR_TABLE_SIZE);
        self
    }

    /// Get the packed flags
    pub fn flags(&self) -> u8 {
        self.flags
    }
}

/// Local color table block
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LocalColorTable {
    colors: Vec<u8>,
}

impl LocalColorTable {
    /// Create a color table, zero-padded to the configured length
    pub fn with_colors(colors: &[u8], tbl: &ColorTableConfig) -> Self {
        let len = tbl.size_bytes();
        let mut colors = colors[..colors.len().min(len)].to_vec();
        colors.resize(len, 0);
        LocalColorTable { colors }
    }

    /// Get the color bytes (red, green, blue)
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }
}

/// Image data block, holding LZW-compressed color indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    min_code_size: u8,
    data: Vec<u8>,
}

impl ImageData {
    /// Compress color indices into an image data block
    pub fn compress(indices: &[u8], min_code_size: u8) -> Result<Self> {
        let min_code_size = min_code_size.max(2); // must be >= 2
        let data =
            Compressor::with_min_code_size(min_code_size)?.compress(indices)?;
        Ok(ImageData {
            min_code_size,
            data,
        })
    }

    /// Get the LZW minimum code size
    pub fn min_code_size(&self) -> u8 {
        self.min_code_size
    }

    /// Get the compressed data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the data split into sub-blocks
    pub fn sub_blocks(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(SUB_BLOCK_LEN)
    }
}

/// Trailer block
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {}

/// Blocks which make up a GIF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Header(Header),
    LogicalScreenDesc(LogicalScreenDesc),
    Application(Application),
    GraphicControl(GraphicControl),
    ImageDesc(ImageDesc),
    LocalColorTable(LocalColorTable),
    ImageData(ImageData),
    Trailer(Trailer),
}

impl From<Header> for Block {
    fn from(b: Header) -> Self {
        Block::Header(b)
    }
}

impl From<LogicalScreenDesc> for Block {
    fn from(b: LogicalScreenDesc) -> Self {
        Block::LogicalScreenDesc(b)
    }
}

impl From<Application> for Block {
    fn from(b: Application) -> Self {
        Block::Application(b)
    }
}

impl From<GraphicControl> for Block {
    fn from(b: GraphicControl) -> Self {
        Block::GraphicControl(b)
    }
}

impl From<ImageDesc> for Block {
    fn from(b: ImageDesc) -> Self {
        Block::ImageDesc(b)
    }
}

impl From<LocalColorTable> for Block {
    fn from(b: LocalColorTable) -> Self {
        Block::LocalColorTable(b)
    }
}

impl From<ImageData> for Block {
    fn from(b: ImageData) -> Self {
        Block::ImageData(b)
    }
}

impl From<Trailer> for Block {
    fn from(b: Trailer) -> Self {
        Block::Trailer(b)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;

    #[test]
    fn color_table_len() {
        let bits = |len| ColorTableConfig::new(len).len_bits();
        assert_eq!(bits(0), 0); // 0-2
        assert_eq!(bits(4), 1); // 3-4
        assert_eq!(bits(7), 2); // 5-8
        assert_eq!(bits(16), 3); // 9-16
        assert_eq!(bits(17), 4); // 17-32
        assert_eq!(bits(64), 5); // 33-64
        assert_eq!(bits(65), 6); // 65-128
        assert_eq!(bits(130), 7); // 129-256
        assert_eq!(ColorTableConfig::new(130).table_len(), 256);
        assert_eq!(ColorTableConfig::new(1).table_len(), 2);
    }

    #[test]
    fn min_code_size() {
        let size = |len| ColorTableConfig::new(len).min_code_size();
        assert_eq!(size(2), 2);
        assert_eq!(size(4), 2);
        assert_eq!(size(8), 3);
        assert_eq!(size(256), 8);
    }

    #[test]
    fn table_config_flags() {
        let tbl = ColorTableConfig::new(20);
        let desc = ImageDesc::default().with_color_table_config(&tbl);
        assert_eq!(desc.flags(), 0b1000_0100);
        assert_eq!(tbl.size_bytes(), 96);
    }

    #[test]
    fn padded_table() {
        let tbl = ColorTableConfig::new(3);
        let colors = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        let t = LocalColorTable::with_colors(&colors, &tbl);
        assert_eq!(t.colors(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 0, 0]);
        let tbl = ColorTableConfig::new(2);
        let t = LocalColorTable::with_colors(&colors, &tbl);
        assert_eq!(t.colors(), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn loop_extension() {
        let b = Application::with_loop_count(0);
        assert_eq!(b.app_data()[0], b"NETSCAPE2.0");
        assert_eq!(b.app_data()[1], [1, 0, 0]);
        let b = Application::with_loop_count(500);
        assert_eq!(b.app_data()[1], [1, 0xF4, 0x01]);
    }

    #[test]
    fn graphic_control() {
        let mut gc = GraphicControl::default();
        gc.set_disposal_method(DisposalMethod::Background);
        gc.set_transparent_color(Some(7));
        assert_eq!(gc.flags(), 0b0000_1001);
        assert_eq!(gc.transparent_color_idx(), 7);
        gc.set_disposal_method(DisposalMethod::Keep);
        gc.set_transparent_color(None);
        assert_eq!(gc.flags(), 0b0000_0100);
        assert_eq!(gc.transparent_color_idx(), 0);
        gc.set_disposal_method(DisposalMethod::Previous);
        assert_eq!(gc.flags(), 0b0000_1100);
    }

    #[test]
    fn screen_desc() {
        let d = LogicalScreenDesc::default().with_color_resolution(8);
        assert_eq!(d.flags(), 0b0111_0000);
        let d = d.with_color_resolution(1);
        assert_eq!(d.flags(), 0);
    }

    #[test]
    fn image_sub_blocks() {
        let indices: Vec<u8> =
            (0..2000u32).map(|i| (i * 31 % 256) as u8).collect();
        let data = ImageData::compress(&indices, 8).unwrap();
        assert_eq!(data.min_code_size(), 8);
        let blocks: Vec<&[u8]> = data.sub_blocks().collect();
        assert!(blocks.len() > 1);
        assert!(blocks.iter().all(|b| !b.is_empty() && b.len() <= 255));
        assert_eq!(blocks.concat(), data.data());
    }

    #[test]
    fn image_index_range() {
        // min code size 1 is raised to 2: four colors
        assert!(ImageData::compress(&[3], 2).is_ok());
        assert_eq!(ImageData::compress(&[3], 1).unwrap().min_code_size(), 2);
        assert!(matches!(
            ImageData::compress(&[4], 2),
            Err(Error::InvalidColorIndex)
        ));
        assert!(matches!(
            ImageData::compress(&[4], 1),
            Err(Error::InvalidColorIndex)
        ));
        assert!(ImageData::compress(&[7], 3).is_ok());
        assert!(ImageData::compress(&[9], 3).is_err());
    }
}
