// buffer.rs
//
// Copyright (c) 2026  The gifrec developers
//
//! Frame buffer between producers and the encoding worker
use crate::Frame;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use log::trace;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// FIFO queue of frames waiting to be encoded.
///
/// Any number of threads may push; one consumer pops.  Frames come out in
/// the order they were pushed.
pub struct FrameBuffer {
    /// Queue sender
    tx: Sender<Frame>,
    /// Queue receiver
    rx: Receiver<Frame>,
    /// Dropped on cancel, disconnecting `cancel_rx`
    cancel_tx: Mutex<Option<Sender<()>>>,
    /// Cancel signal receiver
    cancel_rx: Receiver<()>,
    /// Cancel flag
    cancelled: AtomicBool,
    /// Count of accepted frames
    pushed: AtomicU64,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Create an empty frame buffer
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        let (cancel_tx, cancel_rx) = channel::bounded(0);
        FrameBuffer {
            tx,
            rx,
            cancel_tx: Mutex::new(Some(cancel_tx)),
            cancel_rx,
            cancelled: AtomicBool::new(false),
            pushed: AtomicU64::new(0),
        }
    }

    /// Push a frame without blocking.
    ///
    /// Returns `false` if the buffer was cancelled and the frame dropped.
    /// A frame accepted before [cancel](#method.cancel) returns is always
    /// available to [pop](#method.pop).
    pub fn push(&self, frame: Frame) -> bool {
        // held across the send so cancel cannot slip in between
        let cancel_tx =
            self.cancel_tx.lock().unwrap_or_else(PoisonError::into_inner);
        if cancel_tx.is_none() {
            trace!("frame dropped after cancel");
            return false;
        }
        // the buffer owns a receiver, so the channel is never disconnected
        if self.tx.send(frame).is_err() {
            return false;
        }
        self.pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Pop the oldest frame, blocking until one is available.
    ///
    /// After cancellation, remaining frames are still returned; `None`
    /// means the buffer is cancelled and empty.
    pub fn pop(&self) -> Option<Frame> {
        if let Ok(frame) = self.rx.try_recv() {
            return Some(frame);
        }
        select! {
            recv(self.rx) -> frame => frame.ok(),
            recv(self.cancel_rx) -> _ => self.rx.try_recv().ok(),
        }
    }

    /// Cancel the buffer, waking a blocked consumer
    pub fn cancel(&self) {
        let mut cancel_tx =
            self.cancel_tx.lock().unwrap_or_else(PoisonError::into_inner);
        self.cancelled.store(true, Ordering::Release);
        if cancel_tx.take().is_some() {
            trace!("frame buffer cancelled with {} frames", self.len());
        }
    }

    /// Check if the buffer was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Get the number of frames accepted since creation
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Get the number of buffered frames
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn frame(id: u16) -> Frame {
        Frame::with_rgb_buffer(1, 1, vec![0, 0, 0], id).unwrap()
    }

    #[test]
    fn fifo() {
        let buf = FrameBuffer::new();
        assert!(buf.is_empty());
        for id in 1..=3 {
            assert!(buf.push(frame(id)));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.pushed(), 3);
        for id in 1..=3 {
            assert_eq!(buf.pop().unwrap().delay_time_cs(), id);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn many_producers() {
        const PRODUCERS: u16 = 4;
        const FRAMES: u16 = 250;
        let buf = Arc::new(FrameBuffer::new());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let buf = Arc::clone(&buf);
                thread::spawn(move || {
                    for n in 0..FRAMES {
                        buf.push(frame(p * 1000 + n));
                    }
                })
            })
            .collect();
        let mut next = vec![0; usize::from(PRODUCERS)];
        for _ in 0..PRODUCERS * FRAMES {
            let id = buf.pop().unwrap().delay_time_cs();
            let p = usize::from(id / 1000);
            assert_eq!(id % 1000, next[p]);
            next[p] += 1;
        }
        for p in producers {
            p.join().unwrap();
        }
        assert!(next.iter().all(|n| *n == FRAMES));
        assert!(buf.is_empty());
    }

    #[test]
    fn cancel_wakes_consumer() {
        let buf = Arc::new(FrameBuffer::new());
        let consumer = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || buf.pop().is_none())
        };
        thread::sleep(Duration::from_millis(50));
        buf.cancel();
        assert!(consumer.join().unwrap());
        assert!(buf.is_cancelled());
    }

    #[test]
    fn drain_after_cancel() {
        let buf = FrameBuffer::new();
        buf.push(frame(1));
        buf.push(frame(2));
        buf.cancel();
        buf.cancel();
        assert!(!buf.push(frame(3)));
        assert_eq!(buf.pushed(), 2);
        assert_eq!(buf.pop().unwrap().delay_time_cs(), 1);
        assert_eq!(buf.pop().unwrap().delay_time_cs(), 2);
        assert!(buf.pop().is_none());
        assert!(buf.pop().is_none());
    }

    #[test]
    fn push_during_cancel() {
        let buf = Arc::new(FrameBuffer::new());
        let consumer = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                let mut popped = 0u64;
                while buf.pop().is_some() {
                    popped += 1;
                }
                popped
            })
        };
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let buf = Arc::clone(&buf);
                thread::spawn(move || {
                    let mut accepted = 0u64;
                    while buf.push(frame(p)) {
                        accepted += 1;
                    }
                    accepted
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        buf.cancel();
        let accepted: u64 =
            producers.into_iter().map(|p| p.join().unwrap()).sum();
        assert_eq!(consumer.join().unwrap(), accepted);
        assert_eq!(buf.pushed(), accepted);
        assert!(buf.is_empty());
    }
}
