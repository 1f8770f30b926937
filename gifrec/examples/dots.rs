// dots.rs
use gifrec::{Encoder, IndexedFrame};
use pix::{Palette, Raster, gray::Gray8, rgb::SRgb8};
use std::error::Error;

fn render_circle(
    raster: &mut Raster<Gray8>,
    cx: f32,
    cy: f32,
    r: f32,
    idx: u8,
) {
    let x0 = (cx - r).floor().max(0.0) as u32;
    let x1 = (cx + r).ceil().min(raster.width() as f32) as u32;
    let y0 = (cy - r).floor().max(0.0) as u32;
    let y1 = (cy + r).ceil().min(raster.height() as f32) as u32;
    let rs = r.powi(2);
    for y in y0..y1 {
        let ys = (cy - y as f32 - 0.5).powi(2);
        for x in x0..x1 {
            let xs = (cx - x as f32 - 0.5).powi(2);
            if xs + ys <= rs {
                *raster.pixel_mut(x as i32, y as i32) = Gray8::new(idx);
            }
        }
    }
}

fn page(red: bool) -> IndexedFrame {
    let mut palette = Palette::new(3);
    palette.set_entry(SRgb8::default());
    palette.set_entry(SRgb8::new(255, 208, 0));
    palette.set_entry(SRgb8::new(255, 0, 0));
    let mut r = Raster::with_clear(32, 32);
    render_circle(&mut r, 12.0, 12.0, 3.0, 1);
    render_circle(&mut r, 20.0, 12.0, 3.0, 1);
    render_circle(&mut r, 12.0, 20.0, 3.0, 1);
    render_circle(&mut r, 20.0, 20.0, 3.0, 1);
    if red {
        render_circle(&mut r, 16.0, 16.0, 3.5, 2);
    }
    IndexedFrame::new(r, palette, 200)
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut enc = Encoder::create("dots.gif")?
        .with_loop_count(Some(0))
        .into_frame_enc();
    enc.encode_indexed(&page(true))?;
    enc.encode_indexed(&page(false))?;
    enc.finish()?;
    Ok(())
}
