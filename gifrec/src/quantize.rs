// quantize.rs
//
// Copyright (c) 2026  The gifrec developers
//
//! Octree color quantization
use crate::error::{Error, Result};
use crate::private::Quality;
use log::debug;
use pix::gray::Gray8;
use pix::rgb::{Rgb, SRgb8};
use pix::{Palette, Raster};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;

/// Maximum number of palette entries
pub const MAX_COLORS: usize = 256;

/// Pixels per parallel work item
const CHUNK_PIXELS: usize = 4096;

/// Get the octree branch for one bit of a color.
///
/// Bit 0 is the most significant bit of each channel.  The branch has red in
/// bit 2, green in bit 1 and blue in bit 0.
///
/// ```
/// use gifrec::quantize::branch_index;
///
/// assert_eq!(branch_index(255, 0, 0, 0), 4);
/// let path: Vec<u8> = (0..8).map(|b| branch_index(15, 51, 85, b)).collect();
/// assert_eq!(path, [0, 1, 2, 3, 4, 5, 6, 7]);
/// ```
pub fn branch_index(red: u8, green: u8, blue: u8, bit: u8) -> u8 {
    let mask = 0x80 >> (bit & 0x07);
    (u8::from(red & mask != 0) << 2)
        | (u8::from(green & mask != 0) << 1)
        | u8::from(blue & mask != 0)
}

/// Split a pixel into channel values
fn channels(p: SRgb8) -> (u8, u8, u8) {
    (
        u8::from(Rgb::red(p)),
        u8::from(Rgb::green(p)),
        u8::from(Rgb::blue(p)),
    )
}

/// Child slots of an octree branch
type Children = [OnceLock<Box<Node>>; 8];

/// Create empty child slots
fn children() -> Children {
    std::array::from_fn(|_| OnceLock::new())
}

/// Octree node
enum Node {
    /// Internal node
    Branch(Children),
    /// Final level node
    Leaf(Leaf),
}

/// Leaf accumulating the colors of its pixels.
///
/// Updated concurrently by quantizing threads.
struct Leaf {
    /// Leaf number, in order of creation
    id: u32,
    /// Branch path from the root, 3 bits per level
    key: u32,
    /// Sum of red values
    red: AtomicU64,
    /// Sum of green values
    green: AtomicU64,
    /// Sum of blue values
    blue: AtomicU64,
    /// Number of pixels
    count: AtomicU64,
}

impl Leaf {
    fn new(id: u32, key: u32) -> Self {
        Leaf {
            id,
            key,
            red: AtomicU64::new(0),
            green: AtomicU64::new(0),
            blue: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Add one pixel
    fn update(&self, red: u8, green: u8, blue: u8) {
        self.red.fetch_add(red.into(), Ordering::Relaxed);
        self.green.fetch_add(green.into(), Ordering::Relaxed);
        self.blue.fetch_add(blue.into(), Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Make a swatch from the accumulated totals
    fn swatch(&self) -> Swatch {
        let count = self.count.load(Ordering::Relaxed);
        let mean = |total: &AtomicU64| {
            let total = total.load(Ordering::Relaxed);
            total.checked_div(count).unwrap_or_default() as u8
        };
        Swatch {
            key: self.key,
            count,
            color: [mean(&self.red), mean(&self.green), mean(&self.blue)],
            replacement: None,
        }
    }
}

/// Color octree shared by quantizing threads
struct Octree {
    /// Root branches
    root: Children,
    /// Depth of leaves
    levels: u8,
    /// Number of leaves created
    n_leaves: AtomicU32,
}

impl Octree {
    fn new(levels: u8) -> Self {
        Octree {
            root: children(),
            levels,
            n_leaves: AtomicU32::new(0),
        }
    }

    /// Add a pixel, returning its leaf id
    fn add(&self, red: u8, green: u8, blue: u8) -> Result<u32> {
        let mut branches = &self.root;
        let mut key = 0;
        for bit in 0..self.levels {
            let idx = branch_index(red, green, blue, bit);
            key = (key << 3) | u32::from(idx);
            let is_leaf = bit + 1 == self.levels;
            let node = branches[usize::from(idx)].get_or_init(|| {
                Box::new(if is_leaf {
                    let id = self.n_leaves.fetch_add(1, Ordering::Relaxed);
                    Node::Leaf(Leaf::new(id, key))
                } else {
                    Node::Branch(children())
                })
            });
            match node.as_ref() {
                Node::Branch(next) => branches = next,
                Node::Leaf(leaf) => {
                    leaf.update(red, green, blue);
                    return Ok(leaf.id);
                }
            }
        }
        Err(Error::MalformedOctree)
    }

    /// Collect swatches for all leaves, indexed by leaf id.
    ///
    /// Must not be called while pixels are still being added.
    fn swatches(&self) -> Vec<Swatch> {
        let n_leaves = self.n_leaves.load(Ordering::Relaxed) as usize;
        let mut swatches = vec![Swatch::default(); n_leaves];
        let mut pending = vec![&self.root];
        while let Some(branches) = pending.pop() {
            for node in branches.iter().filter_map(|n| n.get()) {
                match node.as_ref() {
                    Node::Branch(next) => pending.push(next),
                    Node::Leaf(leaf) => {
                        if let Some(s) = swatches.get_mut(leaf.id as usize) {
                            *s = leaf.swatch();
                        }
                    }
                }
            }
        }
        swatches
    }
}

/// Snapshot of a leaf after all pixels are added
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Swatch {
    /// Branch path
    key: u32,
    /// Number of pixels
    count: u64,
    /// Mean color
    color: [u8; 3],
    /// Swatch this one was merged into
    replacement: Option<usize>,
}

/// Manhattan distance between two colors
fn distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(a, b)| u32::from(a.abs_diff(*b)))
        .sum()
}

/// Reduce swatches to `max_colors` survivors.
///
/// Survivors are returned by descending pixel count.  Each removed swatch
/// is redirected to its nearest survivor at the time of removal, so every
/// replacement chain ends on a survivor.
fn reduce(swatches: &mut [Swatch], max_colors: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..swatches.len()).collect();
    order.sort_by(|a, b| {
        let (a, b) = (&swatches[*a], &swatches[*b]);
        b.count.cmp(&a.count).then(a.key.cmp(&b.key))
    });
    while order.len() > max_colors {
        let Some(src) = order.pop() else { break };
        let color = swatches[src].color;
        let nearest = order
            .iter()
            .copied()
            .min_by_key(|i| distance(color, swatches[*i].color));
        swatches[src].replacement = nearest;
    }
    order
}

/// Follow replacements to a surviving swatch
fn resolve(swatches: &[Swatch], mut id: usize) -> &Swatch {
    while let Some(next) = swatches[id].replacement {
        id = next;
    }
    &swatches[id]
}

/// Octree color quantizer.
///
/// Reduces a true color raster to an indexed raster with a palette of at
/// most 256 colors.  Deeper trees keep more shades apart before merging,
/// at the cost of speed.
#[derive(Clone, Copy, Debug)]
pub struct Quantizer {
    /// Octree depth (1 to 8)
    levels: u8,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new(Quality::default())
    }
}

impl Quantizer {
    /// Create a new quantizer
    pub fn new(quality: Quality) -> Self {
        Quantizer {
            levels: quality.levels(),
        }
    }

    /// Get the octree depth
    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// Quantize a raster.
    ///
    /// Palette entries are ordered by descending pixel count.
    pub fn quantize(
        &self,
        raster: &Raster<SRgb8>,
    ) -> Result<(Raster<Gray8>, Palette)> {
        let tree = Octree::new(self.levels);
        let pixels = raster.pixels();
        let mut leaf_ids = vec![0; pixels.len()];
        pixels
            .par_chunks(CHUNK_PIXELS)
            .zip(leaf_ids.par_chunks_mut(CHUNK_PIXELS))
            .try_for_each(|(src, dst)| -> Result<()> {
                for (p, id) in src.iter().zip(dst.iter_mut()) {
                    let (red, green, blue) = channels(*p);
                    *id = tree.add(red, green, blue)?;
                }
                Ok(())
            })?;
        let mut swatches = tree.swatches();
        let survivors = reduce(&mut swatches, MAX_COLORS);
        debug!(
            "quantized {} leaves to {} colors",
            swatches.len(),
            survivors.len()
        );
        let mut palette = Palette::new(MAX_COLORS);
        let mut slots = HashMap::with_capacity(survivors.len());
        for (slot, id) in survivors.iter().enumerate() {
            let [red, green, blue] = swatches[*id].color;
            if palette.set_entry(SRgb8::new(red, green, blue)) != Some(slot) {
                return Err(Error::ColorNotFound);
            }
            slots.insert(swatches[*id].color, u8::try_from(slot)?);
        }
        let lookup = (0..swatches.len())
            .map(|id| {
                let color = resolve(&swatches, id).color;
                slots.get(&color).copied().ok_or(Error::ColorNotFound)
            })
            .collect::<Result<Vec<u8>>>()?;
        let indices: Vec<u8> = leaf_ids
            .par_iter()
            .map(|id| lookup[*id as usize])
            .collect();
        let indexed =
            Raster::with_u8_buffer(raster.width(), raster.height(), indices);
        Ok((indexed, palette))
    }
}
