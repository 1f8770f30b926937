use gifrec::lzw::Decompressor;
use gifrec::{Encoder, Error, Frame, Quality, Recorder};
use std::fs;
use std::thread;

const WIDTH: u16 = 16;
const HEIGHT: u16 = 12;

/// One image parsed from a GIF file
struct Image {
    delay_time_cs: u16,
    width: u16,
    height: u16,
    rgb: Vec<u8>,
}

/// Parsed GIF file
struct Gif {
    screen: (u16, u16),
    loop_count: Option<u16>,
    images: Vec<Image>,
}

fn u16_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([buf[pos], buf[pos + 1]])
}

/// Read sub-blocks, returning the joined data and the next position
fn sub_blocks(buf: &[u8], mut pos: usize) -> (Vec<u8>, usize) {
    let mut data = Vec::new();
    loop {
        let len = usize::from(buf[pos]);
        pos += 1;
        if len == 0 {
            return (data, pos);
        }
        data.extend_from_slice(&buf[pos..pos + len]);
        pos += len;
    }
}

fn parse(buf: &[u8]) -> Gif {
    assert_eq!(&buf[..6], b"GIF89a");
    let screen = (u16_at(buf, 6), u16_at(buf, 8));
    assert_eq!(buf[10], 0x70, "no global color table");
    let mut pos = 13;
    let mut loop_count = None;
    let mut images = Vec::new();
    let mut delay_time_cs = 0;
    loop {
        match buf[pos] {
            0x21 if buf[pos + 1] == 0xFF => {
                let (data, next) = sub_blocks(buf, pos + 2);
                assert_eq!(&data[..11], b"NETSCAPE2.0");
                loop_count = Some(u16::from_le_bytes([data[12], data[13]]));
                pos = next;
            }
            0x21 if buf[pos + 1] == 0xF9 => {
                assert_eq!(buf[pos + 2], 4);
                delay_time_cs = u16_at(buf, pos + 4);
                assert_eq!(buf[pos + 7], 0);
                pos += 8;
            }
            0x2C => {
                let width = u16_at(buf, pos + 5);
                let height = u16_at(buf, pos + 7);
                let flags = buf[pos + 9];
                assert_eq!(flags & 0x80, 0x80, "local color table");
                pos += 10;
                let tbl_len = 2 << (flags & 0b111);
                let table = &buf[pos..pos + tbl_len * 3];
                pos += tbl_len * 3;
                let min_code_size = buf[pos];
                let (data, next) = sub_blocks(buf, pos + 1);
                pos = next;
                let mut dec = Decompressor::with_min_code_size(min_code_size)
                    .unwrap();
                let mut indices = Vec::new();
                dec.decompress(&data, &mut indices).unwrap();
                dec.decompress_finish(&mut indices).unwrap();
                let len = usize::from(width) * usize::from(height);
                assert_eq!(indices.len(), len);
                let rgb = indices
                    .iter()
                    .flat_map(|i| {
                        let i = usize::from(*i) * 3;
                        table[i..i + 3].to_vec()
                    })
                    .collect();
                images.push(Image {
                    delay_time_cs,
                    width,
                    height,
                    rgb,
                });
            }
            0x3B => {
                assert_eq!(pos + 1, buf.len(), "trailer is last");
                break;
            }
            b => panic!("unexpected block {b:#x} at {pos}"),
        }
    }
    Gif {
        screen,
        loop_count,
        images,
    }
}

/// Frame with four colored quadrants
fn quadrants(n: u8) -> Vec<u8> {
    let colors = [
        [n, 0, 0],
        [0, n, 0],
        [0, 0, n],
        [n, n.wrapping_mul(2), 255 - n],
    ];
    let mut rgb = Vec::new();
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let q = usize::from(x >= WIDTH / 2)
                + 2 * usize::from(y >= HEIGHT / 2);
            rgb.extend_from_slice(&colors[q]);
        }
    }
    rgb
}

#[test]
fn record_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.gif");
    let enc = Encoder::create(&path)
        .unwrap()
        .with_quality(Quality::Highest)
        .with_loop_count(Some(0))
        .into_raster_enc();
    let recorder = Recorder::start(enc).unwrap();
    let frames: Vec<Vec<u8>> =
        (0..12).map(|n| quadrants(n * 20 + 10)).collect();
    for (n, rgb) in frames.iter().enumerate() {
        let frame = Frame::with_rgb_buffer(
            u32::from(WIDTH),
            u32::from(HEIGHT),
            rgb.clone(),
            Frame::delay_for_rate(10) + n as u16,
        )
        .unwrap();
        assert!(recorder.push(frame));
    }
    let summary = recorder.stop().unwrap();
    assert_eq!(summary.frames_written, 12);
    let buf = fs::read(&path).unwrap();
    assert_eq!(summary.bytes_written, buf.len() as u64);
    let gif = parse(&buf);
    assert_eq!(gif.screen, (WIDTH, HEIGHT));
    assert_eq!(gif.loop_count, Some(0));
    assert_eq!(gif.images.len(), 12);
    for (n, (image, rgb)) in gif.images.iter().zip(&frames).enumerate() {
        assert_eq!((image.width, image.height), (WIDTH, HEIGHT));
        assert_eq!(image.delay_time_cs, 10 + n as u16);
        assert_eq!(&image.rgb, rgb);
    }
}

#[test]
fn record_from_producers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("producers.gif");
    let enc = Encoder::create(&path).unwrap().into_raster_enc();
    let recorder = Recorder::start(enc).unwrap();
    let producers: Vec<_> = (0..3)
        .map(|p| {
            let buffer = recorder.buffer();
            thread::spawn(move || {
                for n in 0..10 {
                    let rgb = quadrants(p * 50 + n);
                    let frame = Frame::with_rgb_buffer(
                        u32::from(WIDTH),
                        u32::from(HEIGHT),
                        rgb,
                        u16::from(p) * 100 + u16::from(n),
                    )
                    .unwrap();
                    buffer.push(frame);
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    let summary = recorder.stop().unwrap();
    assert_eq!(summary.frames_captured, 30);
    assert_eq!(summary.frames_written, 30);
    let gif = parse(&fs::read(&path).unwrap());
    assert_eq!(gif.loop_count, None);
    let mut next = [0; 3];
    for image in &gif.images {
        let p = usize::from(image.delay_time_cs / 100);
        assert_eq!(image.delay_time_cs % 100, next[p]);
        next[p] += 1;
    }
    assert_eq!(next, [10, 10, 10]);
}

#[test]
fn record_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.gif");
    let enc = Encoder::create(&path).unwrap().into_raster_enc();
    let summary = Recorder::start(enc).unwrap().stop().unwrap();
    assert_eq!(summary.frames_written, 0);
    let buf = fs::read(&path).unwrap();
    assert_eq!(buf, b"GIF89a\0\0\0\0\x70\0\0;");
    assert!(parse(&buf).images.is_empty());
}

#[test]
fn create_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.gif");
    assert!(matches!(Encoder::create(&path), Err(Error::Io(_))));
}
