// main.rs      gifrec command
//
// Copyright (c) 2026  The gifrec developers
//
#![forbid(unsafe_code)]

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use gifrec::{
    Encoder, Frame, Progress, Quality, RasterEnc, Recorder, Summary,
    format_elapsed, format_size,
};
use log::{debug, info};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Crate version
const VERSION: &str = std::env!("CARGO_PKG_VERSION");

/// Result type for the command
type CmdResult<T> = Result<T, Box<dyn Error>>;

/// Main entry point
fn main() -> CmdResult<()> {
    env_logger::builder().format_timestamp(None).init();
    let mut out = StandardStream::stdout(ColorChoice::Auto);
    let res = match create_app().get_matches().subcommand() {
        ("demo", Some(matches)) => demo(&mut out, matches),
        ("raw", Some(matches)) => raw(&mut out, matches),
        _ => Ok(()),
    };
    if let Err(err) = &res {
        let mut red = ColorSpec::new();
        red.set_fg(Some(Color::Red)).set_intense(true);
        out.set_color(&red)?;
        writeln!(out, "error: {err}")?;
    }
    out.reset()?;
    res
}

/// Create clap App
fn create_app() -> App<'static, 'static> {
    App::new("gifrec")
        .version(VERSION)
        .setting(AppSettings::GlobalVersion)
        .about("Animated GIF recorder")
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("demo")
                .about("Record a synthetic animation")
                .arg(file_arg())
                .arg(
                    number_arg("frames", "number of frames")
                        .default_value("50"),
                )
                .arg(number_arg("fps", "frames per second").default_value("10"))
                .arg(number_arg("width", "frame width").default_value("160"))
                .arg(number_arg("height", "frame height").default_value("120"))
                .arg(quality_arg())
                .arg(loop_arg()),
        )
        .subcommand(
            SubCommand::with_name("raw")
                .about("Record raw RGB24 frames from stdin")
                .arg(file_arg())
                .arg(number_arg("width", "frame width").required(true))
                .arg(number_arg("height", "frame height").required(true))
                .arg(number_arg("fps", "frames per second").default_value("10"))
                .arg(quality_arg())
                .arg(loop_arg()),
        )
}

/// Output file argument
fn file_arg() -> Arg<'static, 'static> {
    Arg::with_name("file").required(true).help("output GIF file")
}

/// Numeric option argument
fn number_arg(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .value_name("N")
        .help(help)
}

/// Quality option argument
fn quality_arg() -> Arg<'static, 'static> {
    number_arg("quality", "quantization quality (1-8)").default_value("4")
}

/// Loop count option argument
fn loop_arg() -> Arg<'static, 'static> {
    number_arg("loop", "loop count (0 loops forever)")
}

/// Parse a numeric argument
fn parse_num<T>(matches: &ArgMatches, name: &str) -> CmdResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    match matches.value_of(name) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| format!("invalid {name} \"{v}\": {e}").into()),
        None => Ok(None),
    }
}

/// Parse a required numeric argument
fn require_num<T>(matches: &ArgMatches, name: &str) -> CmdResult<T>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    parse_num(matches, name)?.ok_or_else(|| format!("missing {name}").into())
}

/// Create a raster encoder from common arguments
fn create_encoder(
    matches: &ArgMatches,
) -> CmdResult<RasterEnc<BufWriter<File>>> {
    let path = matches.value_of_os("file").ok_or("missing file")?;
    let quality = Quality::try_from(require_num::<u8>(matches, "quality")?)?;
    let loop_count = parse_num::<u16>(matches, "loop")?;
    debug!("quality {quality:?}, loop count {loop_count:?}");
    Ok(Encoder::create(path)?
        .with_quality(quality)
        .with_loop_count(loop_count)
        .into_raster_enc())
}

/// Parse frame width and height arguments
fn frame_size(matches: &ArgMatches) -> CmdResult<(u32, u32)> {
    check_size(require_num(matches, "width")?, require_num(matches, "height")?)
}

/// Check that a frame size is usable
fn check_size(width: u32, height: u32) -> CmdResult<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(format!("invalid frame size {width}x{height}").into());
    }
    if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        return Err(format!("frame size {width}x{height} too large").into());
    }
    Ok((width, height))
}

/// Handle demo subcommand
fn demo(out: &mut StandardStream, matches: &ArgMatches) -> CmdResult<()> {
    let frames: u32 = require_num(matches, "frames")?;
    let fps: u16 = require_num(matches, "fps")?;
    let (width, height) = frame_size(matches)?;
    let recorder = Recorder::start(create_encoder(matches)?)?;
    let buffer = recorder.buffer();
    let delay = Frame::delay_for_rate(fps);
    let interval = Duration::from_millis(u64::from(delay) * 10);
    info!("demo: {frames} frames, {width}x{height} at {fps} fps");
    let producer = thread::Builder::new()
        .name("demo-capture".into())
        .spawn(move || -> gifrec::Result<()> {
            let start = Instant::now();
            for n in 0..frames {
                let rgb = render_dots(width, height, n);
                buffer.push(Frame::with_rgb_buffer(width, height, rgb, delay)?);
                let next = interval * (n + 1);
                if let Some(wait) = next.checked_sub(start.elapsed()) {
                    thread::sleep(wait);
                }
            }
            Ok(())
        })?;
    let progress = recorder.progress();
    while !producer.is_finished() {
        show_progress(out, &progress)?;
        thread::sleep(Duration::from_millis(250));
    }
    let res = producer.join().map_err(|_| "capture thread panicked")?;
    let summary = recorder.stop()?;
    res?;
    show_summary(out, &summary)
}

/// Colors of the demo dots
const DOT_COLORS: [[u8; 3]; 4] =
    [[255, 64, 64], [64, 255, 64], [64, 64, 255], [255, 255, 0]];

/// Render moving dots over a gradient
fn render_dots(width: u32, height: u32, n: u32) -> Vec<u8> {
    let dots: Vec<(i64, i64, [u8; 3])> = (0..4u32)
        .map(|d| {
            let t = n * (d + 1) * 3;
            let x = (t + d * width / 4) % width;
            let y = (t * 2 + d * height / 3) % height;
            (i64::from(x), i64::from(y), DOT_COLORS[d as usize])
        })
        .collect();
    let radius = i64::from(width.min(height) / 10 + 1);
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let (xi, yi) = (i64::from(x), i64::from(y));
            let dot = dots.iter().find(|(dx, dy, _)| {
                (xi - dx).pow(2) + (yi - dy).pow(2) <= radius * radius
            });
            match dot {
                Some((_, _, color)) => rgb.extend_from_slice(color),
                None => {
                    rgb.push((x * 255 / width) as u8);
                    rgb.push((y * 255 / height) as u8);
                    rgb.push(((n * 4) % 256) as u8);
                }
            }
        }
    }
    rgb
}

/// Handle raw subcommand
fn raw(out: &mut StandardStream, matches: &ArgMatches) -> CmdResult<()> {
    let (width, height) = frame_size(matches)?;
    let fps: u16 = require_num(matches, "fps")?;
    let delay = Frame::delay_for_rate(fps);
    let recorder = Recorder::start(create_encoder(matches)?)?;
    let progress = recorder.progress();
    let len = usize::try_from(u64::from(width) * u64::from(height) * 3)?;
    let mut stdin = io::stdin().lock();
    let mut last = Instant::now();
    loop {
        let mut rgb = vec![0; len];
        match stdin.read_exact(&mut rgb) {
            Ok(()) => (),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if !recorder.push(Frame::with_rgb_buffer(width, height, rgb, delay)?) {
            break;
        }
        if last.elapsed() >= Duration::from_millis(250) {
            show_progress(out, &progress)?;
            last = Instant::now();
        }
    }
    let summary = recorder.stop()?;
    show_summary(out, &summary)
}

/// Show recording progress on one line
fn show_progress(
    out: &mut StandardStream,
    progress: &Arc<Progress>,
) -> CmdResult<()> {
    let mut cyan = ColorSpec::new();
    cyan.set_fg(Some(Color::Cyan)).set_intense(true);
    out.set_color(&cyan)?;
    write!(out, "\r{}", format_elapsed(progress.elapsed()))?;
    out.reset()?;
    write!(
        out,
        "  frames: {}/{}  size: {}   ",
        progress.frames_written(),
        progress.frames_captured(),
        format_size(progress.bytes_written()),
    )?;
    out.flush()?;
    Ok(())
}

/// Show final recording summary
fn show_summary(out: &mut StandardStream, summary: &Summary) -> CmdResult<()> {
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    let mut yellow = ColorSpec::new();
    yellow.set_fg(Some(Color::Yellow)).set_intense(true);
    out.set_color(&bold)?;
    writeln!(
        out,
        "\r{}  frames: {}  size: {}   ",
        format_elapsed(summary.elapsed),
        summary.frames_written,
        format_size(summary.bytes_written),
    )?;
    if summary.frames_skipped > 0 {
        out.set_color(&yellow)?;
        writeln!(out, "skipped frames: {}", summary.frames_skipped)?;
    }
    out.reset()?;
    Ok(())
}
