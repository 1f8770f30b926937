// session.rs
//
// Copyright (c) 2026  The gifrec developers
//
//! Recording sessions
use crate::buffer::FrameBuffer;
use crate::encode::RasterEnc;
use crate::error::{Error, Result};
use crate::Frame;
use log::{error, info, warn};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Running counters of a recording session.
///
/// Updated by the encoding worker; readable from any thread.  Captured
/// frames are counted by the frame buffer, so pushes through
/// [Recorder::buffer] are included.
///
/// [Recorder::buffer]: struct.Recorder.html#method.buffer
pub struct Progress {
    buffer: Arc<FrameBuffer>,
    frames_written: AtomicU64,
    frames_skipped: AtomicU64,
    bytes_written: AtomicU64,
    started: Instant,
    elapsed: OnceLock<Duration>,
}

/// Snapshot of recording [Progress]
///
/// [Progress]: struct.Progress.html
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Frames pushed into the recorder
    pub frames_captured: u64,
    /// Frames written to the file
    pub frames_written: u64,
    /// Frames which could not be encoded
    pub frames_skipped: u64,
    /// Bytes written to the file
    pub bytes_written: u64,
    /// Recording time
    pub elapsed: Duration,
}

/// Animated GIF recorder.
///
/// Frames pushed into the recorder are buffered, then quantized and written
/// in order by a worker thread.
///
/// ```no_run
/// use gifrec::{Encoder, Frame, Recorder};
///
/// # fn main() -> Result<(), gifrec::Error> {
/// let enc = Encoder::create("screen.gif")?.into_raster_enc();
/// let recorder = Recorder::start(enc)?;
/// for _ in 0..10 {
///     let rgb = vec![0x40; 64 * 48 * 3];
///     recorder.push(Frame::with_rgb_buffer(64, 48, rgb, 10)?);
/// }
/// let summary = recorder.stop()?;
/// println!("{} frames", summary.frames_written);
/// # Ok(())
/// # }
/// ```
pub struct Recorder {
    /// Frames waiting to be encoded
    buffer: Arc<FrameBuffer>,
    /// Session counters
    progress: Arc<Progress>,
    /// Encoding worker
    worker: Option<JoinHandle<Result<()>>>,
}

impl Progress {
    fn new(buffer: Arc<FrameBuffer>) -> Self {
        Progress {
            buffer,
            frames_written: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            started: Instant::now(),
            elapsed: OnceLock::new(),
        }
    }

    /// Get the number of frames pushed into the recorder
    pub fn frames_captured(&self) -> u64 {
        self.buffer.pushed()
    }

    /// Get the number of frames written
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    /// Get the number of frames skipped
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    /// Get the number of bytes written
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Get the recording time, frozen once the session ends
    pub fn elapsed(&self) -> Duration {
        self.elapsed
            .get()
            .copied()
            .unwrap_or_else(|| self.started.elapsed())
    }

    /// Check if the session has ended
    pub fn is_finished(&self) -> bool {
        self.elapsed.get().is_some()
    }

    /// Take a snapshot of all counters
    pub fn summary(&self) -> Summary {
        Summary {
            frames_captured: self.frames_captured(),
            frames_written: self.frames_written(),
            frames_skipped: self.frames_skipped(),
            bytes_written: self.bytes_written(),
            elapsed: self.elapsed(),
        }
    }

    fn frame_written(&self, bytes_written: u64) {
        self.bytes_written.store(bytes_written, Ordering::Relaxed);
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, bytes_written: u64) {
        self.bytes_written.store(bytes_written, Ordering::Relaxed);
        let _ = self.elapsed.set(self.started.elapsed());
    }
}

impl Recorder {
    /// Start recording with a raster encoder.
    ///
    /// The encoder's sink must already be open.
    pub fn start<W>(enc: RasterEnc<W>) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let buffer = Arc::new(FrameBuffer::new());
        let progress = Arc::new(Progress::new(Arc::clone(&buffer)));
        let worker = {
            let buffer = Arc::clone(&buffer);
            let progress = Arc::clone(&progress);
            thread::Builder::new()
                .name("gifrec-encoder".into())
                .spawn(move || encode_frames(enc, &buffer, &progress))?
        };
        info!("recording started");
        Ok(Recorder {
            buffer,
            progress,
            worker: Some(worker),
        })
    }

    /// Push a frame without blocking.
    ///
    /// Returns `false` if the recording has ended.
    pub fn push(&self, frame: Frame) -> bool {
        self.buffer.push(frame)
    }

    /// Get the frame buffer, for pushing from other threads
    pub fn buffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Get the session counters
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Stop recording.
    ///
    /// Frames still buffered are encoded before the trailer is written.
    pub fn stop(mut self) -> Result<Summary> {
        self.halt()
    }

    fn halt(&mut self) -> Result<Summary> {
        self.buffer.cancel();
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| Error::WorkerPanicked)??;
        }
        let summary = self.progress.summary();
        info!(
            "recording stopped: {} frames, {}, {}",
            summary.frames_written,
            format_size(summary.bytes_written),
            format_elapsed(summary.elapsed)
        );
        Ok(summary)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(err) = self.halt() {
                error!("recording failed: {err}");
            }
        }
    }
}

/// Encode frames from a buffer until it is cancelled and empty
fn encode_frames<W: Write>(
    mut enc: RasterEnc<W>,
    buffer: &FrameBuffer,
    progress: &Progress,
) -> Result<()> {
    while let Some(frame) = buffer.pop() {
        match enc.encode_frame(&frame) {
            Ok(()) => progress.frame_written(enc.bytes_written()),
            Err(err) if err.is_frame_local() => {
                warn!("frame skipped: {err}");
                progress.frame_skipped();
            }
            Err(err) => {
                error!("recording aborted: {err}");
                buffer.cancel();
                progress.finish(enc.bytes_written());
                return Err(err);
            }
        }
    }
    let res = enc.finish();
    if let Err(err) = &res {
        error!("trailer not written: {err}");
    }
    progress.finish(enc.bytes_written());
    res
}

/// Format a byte count with decimal units
pub fn format_size(bytes: u64) -> String {
    for (unit, scale) in [("GB", 1e9), ("MB", 1e6), ("KB", 1e3)] {
        let value = (bytes as f64 / scale * 100.0).round() / 100.0;
        if value >= 1.0 {
            return format!("{value:.2} {unit}");
        }
    }
    format!("{bytes} B")
}

/// Format a recording time as minutes and seconds ("mm:ss")
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60 % 60, secs % 60)
}
