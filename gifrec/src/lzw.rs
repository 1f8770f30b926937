// lzw.rs
//
// Copyright (c) 2026  The gifrec developers
//
//! Lempel-Ziv-Welch compression for GIF
use crate::error::{Error, Result};
use log::trace;
use std::cmp::Ordering;
use std::ops::AddAssign;

/// Get the number of bits needed to represent a value.
///
/// Zero still needs one bit.
pub fn bit_length(value: u32) -> u8 {
    (u32::BITS - value.leading_zeros()).max(1) as u8
}

/// Code Bits
#[derive(Clone, Copy, Debug, PartialEq)]
struct Bits(u8);

impl From<u8> for Bits {
    fn from(bits: u8) -> Self {
        Bits(bits.min(Self::MAX.0))
    }
}

impl From<Bits> for u8 {
    fn from(bits: Bits) -> Self {
        bits.0
    }
}

impl AddAssign<u8> for Bits {
    fn add_assign(&mut self, rhs: u8) {
        self.0 = (self.0 + rhs).min(Self::MAX.0)
    }
}

impl Bits {
    /// Maximum code bits allowed for GIF
    const MAX: Self = Bits(12);

    /// Get starting code bits for a dictionary (enough for the end code)
    fn start(dict_size: Code) -> Self {
        Bits::from(bit_length(u32::from(dict_size) + 1))
    }

    /// Get the number of entries
    fn entries(self) -> Code {
        1 << (self.0 as Code)
    }

    /// Get the bit mask
    fn mask(self) -> u32 {
        (1 << (self.0 as u32)) - 1
    }
}

/// Code type
type Code = u16;

/// Check that a dictionary has room for clear and end codes
fn check_dict_size(dict_size: Code) -> Result<Code> {
    if (2..=Bits::MAX.entries() - 2).contains(&dict_size) {
        Ok(dict_size)
    } else {
        Err(Error::InvalidDictionarySize(dict_size))
    }
}

/// Get the dictionary size for an LZW minimum code size
fn dict_size(min_code_size: u8) -> Code {
    (1 as Code).checked_shl(min_code_size.into()).unwrap_or(0)
}

/// Packer for variable-width codes.
///
/// Codes are written least-significant bit first, crossing byte boundaries
/// as needed.
#[derive(Debug, Default)]
pub struct BitPacker {
    /// Completed bytes
    buffer: Vec<u8>,
    /// Pending bits
    code: u32,
    /// Number of pending bits
    n_bits: u8,
}

impl BitPacker {
    /// Create a new bit packer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bit packer appending to an existing buffer
    pub fn with_buffer(buffer: Vec<u8>) -> Self {
        BitPacker {
            buffer,
            code: 0,
            n_bits: 0,
        }
    }

    /// Write the low `bits` bits of a value (1 to 16)
    pub fn write(&mut self, value: u16, bits: u8) {
        let bits = bits.clamp(1, 16);
        let mask = (1 << u32::from(bits)) - 1;
        self.code |= (u32::from(value) & mask) << self.n_bits;
        self.n_bits += bits;
        while self.n_bits >= 8 {
            self.buffer.push(self.code as u8);
            self.code >>= 8;
            self.n_bits -= 8;
        }
    }

    /// Get the number of completed bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no bytes have been completed
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Finish packing, zero-padding the final partial byte
    pub fn flush(mut self) -> Vec<u8> {
        if self.n_bits > 0 {
            self.buffer.push(self.code as u8);
        }
        self.buffer
    }
}

/// Node for code dictionary
trait Node {
    /// Create a new node
    fn new(next: Option<Code>, byte: u8) -> Self;

    /// Get the next node
    fn next(self) -> Option<Code>;

    /// Get the byte value
    fn byte(self) -> u8;
}

/// Node for Compressor
#[derive(Clone, Copy, Debug)]
struct CNode {
    /// Next node code
    next: Option<Code>,
    /// Left node code
    left: Option<Code>,
    /// Right node code
    right: Option<Code>,
    /// Byte value
    byte: u8,
}

/// Node for Decompressor
#[derive(Clone, Copy, Debug)]
struct DNode {
    /// Next node code
    next: Option<Code>,
    /// Byte value
    byte: u8,
}

/// Code dictionary trie
#[derive(Debug)]
struct Trie<N: Node> {
    /// Table of codes
    table: Vec<N>,
    /// Number of root symbols
    dict_size: Code,
}

/// LZW Data Compressor
#[derive(Debug)]
pub struct Compressor {
    /// Code dictionary
    trie: Trie<CNode>,
    /// Code bits after a reset
    start_bits: Bits,
    /// Current code bits
    code_bits: Bits,
}

/// LZW Data Decompressor
#[derive(Debug)]
pub struct Decompressor {
    /// Code dictionary
    trie: Trie<DNode>,
    /// Code bits after a reset
    start_bits: Bits,
    /// Current code bits
    code_bits: Bits,
    /// Last code
    last: Option<Code>,
    /// Current code
    code: u32,
    /// Number of bits in current code
    n_bits: u8,
    /// End code received
    done: bool,
}

impl Node for CNode {
    fn new(next: Option<Code>, byte: u8) -> Self {
        CNode {
            next,
            left: None,
            right: None,
            byte,
        }
    }

    fn next(self) -> Option<Code> {
        self.next
    }

    fn byte(self) -> u8 {
        self.byte
    }
}

impl Node for DNode {
    fn new(next: Option<Code>, byte: u8) -> Self {
        DNode { next, byte }
    }

    fn next(self) -> Option<Code> {
        self.next
    }

    fn byte(self) -> u8 {
        self.byte
    }
}

impl CNode {
    /// Get a link code
    fn link(&self, ordering: Ordering) -> Option<Code> {
        match ordering {
            Ordering::Less => self.left,
            Ordering::Equal => self.next,
            Ordering::Greater => self.right,
        }
    }

    /// Set a link code
    fn set_link(&mut self, ordering: Ordering, code: Code) {
        match ordering {
            Ordering::Less => self.left = Some(code),
            Ordering::Equal => self.next = Some(code),
            Ordering::Greater => self.right = Some(code),
        }
    }
}

impl<N: Node> Trie<N> {
    /// Create a new code dictionary
    fn new(dict_size: Code) -> Self {
        let mut trie = Trie {
            table: Vec::with_capacity(usize::from(Bits::MAX.entries()) + 1),
            dict_size,
        };
        trie.reset();
        trie
    }

    /// Get the clear code
    fn clear_code(&self) -> Code {
        self.dict_size
    }

    /// Get the end code
    fn end_code(&self) -> Code {
        self.clear_code() + 1
    }

    /// Get the next available code
    fn next_code(&self) -> Code {
        self.table.len() as Code
    }

    /// Reset the dictionary
    fn reset(&mut self) {
        self.table.clear();
        // roots above 255 can never be reached from byte input
        for sym in 0..self.dict_size {
            self.push_node(None, sym as u8);
        }
        self.push_node(None, 0); // clear code
        self.push_node(None, 0); // end code
    }

    /// Push a node into the dictionary
    fn push_node(&mut self, next: Option<Code>, byte: u8) {
        self.table.push(N::new(next, byte))
    }

    /// Get a mutable node
    fn node_mut(&mut self, code: Code) -> &mut N {
        debug_assert!(code < self.next_code());
        &mut self.table[code as usize]
    }
}

impl Trie<CNode> {
    /// Search and insert a node
    fn search_insert(&mut self, code: Option<Code>, byte: u8) -> Option<Code> {
        match code {
            Some(code) => self.insert(code, byte),
            None => Some(byte as Code),
        }
    }

    /// Insert a node
    fn insert(&mut self, code: Code, byte: u8) -> Option<Code> {
        let next_code = self.next_code();
        let mut node = self.node_mut(code);
        let mut ordering = Ordering::Equal;
        while let Some(code) = node.link(ordering) {
            node = self.node_mut(code);
            ordering = byte.cmp(&node.byte());
            if ordering == Ordering::Equal {
                return Some(code);
            }
        }
        node.set_link(ordering, next_code);
        self.push_node(None, byte);
        None
    }
}

impl Compressor {
    /// Create a new compressor.
    ///
    /// The dictionary holds `dict_size` root symbols, followed by the clear
    /// and end codes.
    pub fn new(dict_size: u16) -> Result<Self> {
        let dict_size = check_dict_size(dict_size)?;
        let start_bits = Bits::start(dict_size);
        Ok(Compressor {
            trie: Trie::<CNode>::new(dict_size),
            start_bits,
            code_bits: start_bits,
        })
    }

    /// Create a compressor for a GIF minimum code size
    pub fn with_min_code_size(min_code_size: u8) -> Result<Self> {
        Self::new(dict_size(min_code_size))
    }

    /// Get the dictionary size
    pub fn dict_size(&self) -> u16 {
        self.trie.dict_size
    }

    /// Compress a byte buffer.
    ///
    /// Every byte must be smaller than the dictionary size.  An empty buffer
    /// produces only the clear and end codes.
    pub fn compress(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut packer = BitPacker::with_buffer(Vec::with_capacity(
            bytes.len() / 2 + 4,
        ));
        self.trie.reset();
        self.code_bits = self.start_bits;
        packer.write(self.trie.clear_code(), self.code_bits.into());
        let mut code = None;
        for byte in bytes {
            if Code::from(*byte) >= self.trie.clear_code() {
                return Err(Error::InvalidColorIndex);
            }
            code = match self.trie.search_insert(code, *byte) {
                Some(code) => Some(code),
                None => {
                    if let Some(code) = code {
                        packer.write(code, self.code_bits.into());
                    }
                    Some(Code::from(*byte))
                }
            };
            let next_code = self.trie.next_code();
            if next_code > self.code_bits.entries() {
                if next_code > Bits::MAX.entries() {
                    trace!("LZW dictionary full, resetting");
                    packer.write(self.trie.clear_code(), self.code_bits.into());
                    self.trie.reset();
                    self.code_bits = self.start_bits;
                } else {
                    self.code_bits += 1;
                }
            }
        }
        if let Some(code) = code {
            packer.write(code, self.code_bits.into());
        }
        packer.write(self.trie.end_code(), self.code_bits.into());
        Ok(packer.flush())
    }
}

/// Compress a byte buffer with a dictionary of `dict_size` root symbols.
///
/// ```
/// let data = [0, 0, 0, 0, 2, 2, 2, 2, 4, 4, 4, 4, 5, 5, 5, 5];
/// let packed = gifrec::lzw::encode(&data, 8)?;
/// assert_eq!(packed, [0x08, 0x0A, 0xD2, 0x42, 0x90, 0x94, 0x59, 0x12]);
/// # Ok::<(), gifrec::Error>(())
/// ```
pub fn encode(bytes: &[u8], dict_size: u16) -> Result<Vec<u8>> {
    Compressor::new(dict_size)?.compress(bytes)
}

impl Trie<DNode> {
    /// Lookup a code value
    fn lookup(&self, code: Code) -> u8 {
        debug_assert!(code < self.next_code());
        let mut node = self.table[code as usize];
        while let Some(code) = node.next {
            node = self.table[code as usize];
        }
        node.byte()
    }

    /// Decompress a code into a buffer (reversed)
    fn decompress_reversed(&self, code: Code, buffer: &mut Vec<u8>) {
        debug_assert!(code < self.next_code());
        let mut node = self.table[code as usize];
        while let Some(code) = node.next {
            buffer.push(node.byte());
            node = self.table[code as usize];
        }
        buffer.push(node.byte());
    }
}

impl Decompressor {
    /// Create a new decompressor
    pub fn new(dict_size: u16) -> Result<Self> {
        let dict_size = check_dict_size(dict_size)?;
        let start_bits = Bits::start(dict_size);
        Ok(Decompressor {
            trie: Trie::<DNode>::new(dict_size),
            start_bits,
            code_bits: start_bits,
            last: None,
            code: 0,
            n_bits: 0,
            done: false,
        })
    }

    /// Create a decompressor for a GIF minimum code size
    pub fn with_min_code_size(min_code_size: u8) -> Result<Self> {
        Self::new(dict_size(min_code_size))
    }

    /// Get the most recent code
    fn code(&mut self) -> Option<Code> {
        let b = u8::from(self.code_bits);
        if self.n_bits >= b {
            let code = (self.code & self.code_bits.mask()) as Code;
            self.code >>= b;
            self.n_bits -= b;
            Some(code)
        } else {
            None
        }
    }

    /// Unpack one code from a buffer
    fn unpack(&mut self, buffer: &[u8]) -> (usize, Option<Code>) {
        let mut n_consumed = 0;
        for byte in buffer {
            if self.n_bits >= self.code_bits.into() {
                break;
            }
            self.code |= (*byte as u32) << self.n_bits;
            self.n_bits += 8;
            n_consumed += 1;
        }
        (n_consumed, self.code())
    }

    /// Decompress a byte buffer
    pub fn decompress(
        &mut self,
        bytes: &[u8],
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        let mut bytes = bytes;
        while !bytes.is_empty() && !self.done {
            let (consumed, code) = self.unpack(bytes);
            if let Some(code) = code {
                self.decompress_code(code, buffer)?;
            }
            bytes = &bytes[consumed..];
        }
        Ok(())
    }

    /// Finish Decompress
    pub fn decompress_finish(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        while !self.done {
            match self.code() {
                Some(code) => self.decompress_code(code, buffer)?,
                None => break,
            }
        }
        Ok(())
    }

    /// Decompress one code
    fn decompress_code(
        &mut self,
        code: Code,
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        if code == self.trie.clear_code() {
            self.trie.reset();
            self.code_bits = self.start_bits;
            self.last = None;
        } else if code == self.trie.end_code() {
            self.done = true;
        } else {
            let start = buffer.len();
            self.decompress_reversed(code, buffer)?;
            buffer[start..].reverse();
            self.last = Some(code);
        }
        Ok(())
    }

    /// Decompress one code (reversed)
    fn decompress_reversed(
        &mut self,
        code: Code,
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        let next_code = self.trie.next_code();
        match (self.last, code.cmp(&next_code)) {
            (_, Ordering::Greater) => return Err(Error::InvalidLzwData),
            (Some(last), Ordering::Less) => {
                self.trie.decompress_reversed(code, buffer);
                let byte =
                    buffer.last().copied().ok_or(Error::InvalidLzwData)?;
                self.trie.push_node(Some(last), byte);
            }
            (Some(last), Ordering::Equal) => {
                self.trie.push_node(Some(last), self.trie.lookup(last));
                self.trie.decompress_reversed(code, buffer);
            }
            (None, _) if code < self.trie.clear_code() => {
                buffer.push(code as u8)
            }
            (None, _) => return Err(Error::InvalidLzwData),
        }
        // the compressor is one entry ahead of this table
        if self.trie.next_code() + 1 > self.code_bits.entries() {
            self.code_bits += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Pseudo-random bytes below a limit
    fn noise(len: usize, limit: u16, mut seed: u32) -> Vec<u8> {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((seed >> 16) % u32::from(limit)) as u8
            })
            .collect()
    }

    fn round_trip(data: &[u8], dict_size: u16) {
        let packed = encode(data, dict_size).unwrap();
        let mut dec = Decompressor::new(dict_size).unwrap();
        let mut out = vec![];
        dec.decompress(&packed, &mut out).unwrap();
        dec.decompress_finish(&mut out).unwrap();
        assert_eq!(out, data, "dictionary size {dict_size}");
    }

    #[test]
    fn bit_lengths() {
        assert_eq!(bit_length(0), 1);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(255), 8);
        assert_eq!(bit_length(256), 9);
        assert_eq!(bit_length(511), 9);
        assert_eq!(bit_length(2048), 12);
        assert_eq!(bit_length(4095), 12);
        assert_eq!(bit_length(65535), 16);
    }

    #[test]
    fn packer() {
        let mut p = BitPacker::new();
        p.write(0b101, 3);
        p.write(0b11111, 5);
        assert_eq!(p.len(), 1);
        p.write(0xABC, 12);
        assert_eq!(p.flush(), [0b1111_1101, 0xBC, 0x0A]);
        let mut p = BitPacker::new();
        p.write(0xFFFF, 4);
        assert_eq!(p.flush(), [0x0F]);
        assert!(BitPacker::new().is_empty());
        assert_eq!(BitPacker::new().flush(), Vec::<u8>::new());
    }

    #[test]
    fn halftone_dictionary() {
        let data = [
            251, 251, 251, 251, 5, 5, 5, 5, 210, 210, 210, 210, 36, 36, 36, 36,
        ];
        assert_eq!(
            encode(&data, 256).unwrap(),
            [0, 247, 9, 220, 87, 160, 96, 1, 105, 8, 165, 145, 88, 72, 34, 32]
        );
    }

    #[test]
    fn small_dictionary() {
        let data = [0, 0, 0, 0, 2, 2, 2, 2, 4, 4, 4, 4, 5, 5, 5, 5];
        assert_eq!(
            encode(&data, 8).unwrap(),
            [0x08, 0x0A, 0xD2, 0x42, 0x90, 0x94, 0x59, 0x12]
        );
        let data = [3, 6, 1, 7, 3, 6, 1, 7, 3, 6, 1, 7, 3, 6, 1, 7];
        assert_eq!(
            encode(&data, 8).unwrap(),
            [0x38, 0x16, 0xA7, 0xEC, 0x6D, 0x9D, 0x04]
        );
    }

    #[test]
    fn min_code_size() {
        let data = [0, 0, 0, 0, 2, 2, 2, 2, 4, 4, 4, 4, 5, 5, 5, 5];
        let mut c = Compressor::with_min_code_size(3).unwrap();
        assert_eq!(c.dict_size(), 8);
        assert_eq!(c.compress(&data).unwrap(), encode(&data, 8).unwrap());
        // compressor is reusable
        assert_eq!(c.compress(&data).unwrap(), encode(&data, 8).unwrap());
        let mut c = Compressor::with_min_code_size(2).unwrap();
        assert_eq!(c.compress(&[0, 0, 1, 3]).unwrap(), [0x04, 0x32, 0x05]);
        assert!(Compressor::with_min_code_size(12).is_err());
        assert!(Compressor::with_min_code_size(40).is_err());
    }

    #[test]
    fn empty_input() {
        assert_eq!(encode(&[], 256).unwrap(), [0x00, 0x03, 0x02]);
        assert_eq!(encode(&[7], 256).unwrap(), [0x00, 0x0F, 0x04, 0x04]);
        round_trip(&[], 4);
    }

    #[test]
    fn invalid_input() {
        assert!(matches!(
            encode(&[1, 2, 8], 8),
            Err(Error::InvalidColorIndex)
        ));
        assert!(matches!(
            Compressor::new(4095),
            Err(Error::InvalidDictionarySize(4095))
        ));
        assert!(Compressor::new(1).is_err());
        assert!(Compressor::new(4094).is_ok());
    }

    #[test]
    fn round_trips() {
        for dict_size in [2, 3, 4, 6, 8, 14, 16, 100, 254, 256, 1000, 4094] {
            let limit = dict_size.min(256);
            round_trip(&[0], dict_size);
            round_trip(&noise(5, limit, 1), dict_size);
            round_trip(&noise(300, limit, 2), dict_size);
            round_trip(&vec![(limit - 1) as u8; 5000], dict_size);
        }
    }

    #[test]
    fn table_resets() {
        // enough unique strings to fill the dictionary several times
        round_trip(&noise(70_000, 256, 7), 256);
        round_trip(&noise(40_000, 16, 11), 16);
        let ramp: Vec<u8> = (0..30_000).map(|i| (i / 7 % 5) as u8).collect();
        round_trip(&ramp, 8);
    }

    #[test]
    fn corrupt_data() {
        // clear code, then a code beyond the table
        let mut p = BitPacker::new();
        p.write(4, 3);
        p.write(7, 3);
        let mut dec = Decompressor::new(4).unwrap();
        let mut out = vec![];
        let res = dec
            .decompress(&p.flush(), &mut out)
            .and_then(|_| dec.decompress_finish(&mut out));
        assert!(matches!(res, Err(Error::InvalidLzwData)));
    }
}
