// src/io/serial/framer.rs
//
// Frame assembly for the serial read loop.
// Accumulates received bytes and cuts them into Frames according to the
// active DelimiterMode. Time is passed in explicitly (`*_at` variants) so the
// read loop and the tests share one code path.

use std::time::{Duration, Instant};

use super::delimiter::{decide, interval_expired, Boundary, DelimiterMode};
use crate::io::types::Frame;

// =============================================================================
// Types
// =============================================================================

/// Why the open frame was completed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Completion {
    /// Interval reached (by tick or by a late byte)
    Interval,
    /// Delimiter byte appended
    Delimiter,
    /// Forced split at max_frame_length
    MaxLength,
    /// Policy switch or session close
    Forced,
}

/// Stateful accumulator turning a byte stream into Frames
#[derive(Debug)]
pub struct FrameAssembler {
    mode: DelimiterMode,
    buffer: Vec<u8>,
    /// When the first byte of the open frame arrived
    frame_started: Option<Instant>,
    /// Append flag decided when the open frame started
    frame_append: bool,
    /// Last interval boundary; a frame starting within one interval of it continues it
    last_boundary: Option<Instant>,
    /// The previous frame was split on length, so the next one continues it
    split_pending: bool,
    max_frame_length: Option<usize>,
}

impl FrameAssembler {
    pub fn new(mode: DelimiterMode) -> Self {
        FrameAssembler {
            mode,
            buffer: Vec::new(),
            frame_started: None,
            frame_append: false,
            last_boundary: None,
            split_pending: false,
            max_frame_length: None,
        }
    }

    /// Force a split once a frame reaches `max` bytes. Values below 2 are raised to 2.
    pub fn with_max_frame_length(mut self, max: Option<usize>) -> Self {
        self.max_frame_length = max.map(|m| m.max(2));
        self
    }

    pub fn mode(&self) -> DelimiterMode {
        self.mode
    }

    /// Number of bytes in the open frame
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Age of the open frame, if one is open
    pub fn open_for(&self, now: Instant) -> Option<Duration> {
        self.frame_started.map(|start| now.saturating_duration_since(start))
    }

    // -------------------------------------------------------------------------
    // Feeding
    // -------------------------------------------------------------------------

    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        self.feed_at(byte, Instant::now())
    }

    /// Consume one byte received at `now`. Emits at most one completed frame.
    pub fn feed_at(&mut self, byte: u8, now: Instant) -> Option<Frame> {
        match decide(&self.mode, self.open_for(now), byte) {
            Boundary::Continue => {
                self.push(byte, now);
                if self.is_full() {
                    self.complete(Completion::MaxLength, now)
                } else {
                    None
                }
            }
            Boundary::CloseAfter => {
                self.push(byte, now);
                self.complete(Completion::Delimiter, now)
            }
            Boundary::CloseBefore => {
                let frame = self.complete(Completion::Interval, now);
                self.push(byte, now);
                frame
            }
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.extend_at(bytes, Instant::now())
    }

    /// Consume a chunk of bytes that all arrived at `now`
    pub fn extend_at(&mut self, bytes: &[u8], now: Instant) -> Vec<Frame> {
        bytes
            .iter()
            .filter_map(|&byte| self.feed_at(byte, now))
            .collect()
    }

    pub fn tick(&mut self) -> Option<Frame> {
        self.tick_at(Instant::now())
    }

    /// Periodic check from the read loop. In interval mode, completes an open
    /// frame whose age reached the interval. Never emits an empty frame.
    pub fn tick_at(&mut self, now: Instant) -> Option<Frame> {
        if interval_expired(&self.mode, self.open_for(now)) {
            self.complete(Completion::Interval, now)
        } else {
            None
        }
    }

    // -------------------------------------------------------------------------
    // Policy changes and flushing
    // -------------------------------------------------------------------------

    pub fn set_mode(&mut self, mode: DelimiterMode) -> Option<Frame> {
        self.set_mode_at(mode, Instant::now())
    }

    /// Replace the delimiting mode. A non-empty open frame is completed first
    /// so no frame mixes bytes assembled under two policies.
    pub fn set_mode_at(&mut self, mode: DelimiterMode, now: Instant) -> Option<Frame> {
        let frame = self.complete(Completion::Forced, now);
        self.mode = mode;
        frame
    }

    /// Complete whatever is open (session close)
    pub fn flush(&mut self) -> Option<Frame> {
        self.complete(Completion::Forced, Instant::now())
    }

    /// Drop the open frame and continuation state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.frame_started = None;
        self.frame_append = false;
        self.last_boundary = None;
        self.split_pending = false;
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn push(&mut self, byte: u8, now: Instant) {
        if self.buffer.is_empty() {
            self.frame_started = Some(now);
            self.frame_append = self.continues_previous(now);
            self.split_pending = false;
        }
        self.buffer.push(byte);
    }

    fn continues_previous(&self, now: Instant) -> bool {
        if self.split_pending {
            return true;
        }
        match (self.mode, self.last_boundary) {
            (DelimiterMode::Interval(interval), Some(boundary)) => {
                now.saturating_duration_since(boundary) < interval
            }
            _ => false,
        }
    }

    fn is_full(&self) -> bool {
        self.max_frame_length
            .map(|max| self.buffer.len() >= max)
            .unwrap_or(false)
    }

    fn complete(&mut self, reason: Completion, now: Instant) -> Option<Frame> {
        if self.buffer.is_empty() {
            if reason == Completion::Forced {
                self.last_boundary = None;
                self.split_pending = false;
            }
            return None;
        }

        let frame = Frame {
            append: self.frame_append,
            data: std::mem::take(&mut self.buffer),
        };
        self.frame_started = None;

        match reason {
            Completion::Interval => {
                self.last_boundary = Some(now);
                self.split_pending = false;
            }
            Completion::MaxLength => {
                self.last_boundary = Some(now);
                self.split_pending = true;
            }
            Completion::Delimiter | Completion::Forced => {
                self.last_boundary = None;
                self.split_pending = false;
            }
        }

        Some(frame)
    }
}

// =============================================================================
// Tests
// =============================================================================
