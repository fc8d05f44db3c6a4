//! Playback synchronization state machine.
//!
//! Tracks which lyric line is active for the current playback position
//! (after the per-track offset correction) and whether the view follows
//! playback or a manual scroll override. The machine is clock-free:
//! callers pass `Instant`s in and arm their own timer for the reported
//! deadline, so every transition is testable without a runtime.

use std::time::{Duration, Instant};

use crate::lyrics::LyricLine;

/// Idle: lyrics loaded but nothing active yet (display hidden).
/// Synced: the active line tracks playback. Manual: the user is
/// scrolling independently until the inactivity deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Synced,
    Manual,
}

/// State transitions for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// First line became active; reveal the line display.
    Revealed,
    /// Mark `previous` past and `current` active.
    LineChanged {
        previous: Option<usize>,
        current: Option<usize>,
    },
    /// Center this line vertically.
    ScrollTo { index: usize },
    ModeChanged(Mode),
}

#[derive(Debug)]
pub struct SyncEngine {
    lines: Vec<LyricLine>,
    offset_ms: i64,
    active: Option<usize>,
    started: bool,
    mode: Mode,
    view: usize,
    deadline: Option<Instant>,
    last_progress_ms: u64,
    manual_timeout: Duration,
}

impl SyncEngine {
    pub fn new(manual_timeout: Duration) -> Self {
        Self {
            lines: Vec::new(),
            offset_ms: 0,
            active: None,
            started: false,
            mode: Mode::Idle,
            view: 0,
            deadline: None,
            last_progress_ms: 0,
            manual_timeout,
        }
    }

    /// Load a new sequence and reset to Idle. The caller re-feeds the
    /// current position afterwards to (re)activate a line.
    pub fn load(&mut self, lines: Vec<LyricLine>, offset_ms: i64) {
        self.lines = lines;
        self.offset_ms = offset_ms;
        self.active = None;
        self.started = false;
        self.mode = Mode::Idle;
        self.view = 0;
        self.deadline = None;
        self.last_progress_ms = 0;
    }

    pub fn unload(&mut self) {
        self.load(Vec::new(), 0);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// When Some, the driver should call `tick` at (or after) this instant.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn last_progress_ms(&self) -> u64 {
        self.last_progress_ms
    }

    /// Feed a playback position and recompute the active line.
    pub fn on_progress(&mut self, progress_ms: u64) -> Vec<SyncEvent> {
        self.last_progress_ms = progress_ms;
        self.recompute()
    }

    /// Change the offset correction; the active line can move with no
    /// playback movement at all.
    pub fn set_offset(&mut self, offset_ms: i64) -> Vec<SyncEvent> {
        self.offset_ms = offset_ms;
        self.recompute()
    }

    /// Manual scroll by `delta` lines. Enters Manual mode, clamps the
    /// view to the sequence bounds, and (re)arms the inactivity deadline.
    pub fn on_manual_scroll(&mut self, delta: i32, now: Instant) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        if self.lines.is_empty() || !self.started {
            return events;
        }

        if self.mode != Mode::Manual {
            self.mode = Mode::Manual;
            self.view = self.active.unwrap_or(0);
            events.push(SyncEvent::ModeChanged(Mode::Manual));
        }

        let max = (self.lines.len() - 1) as i64;
        self.view = (self.view as i64 + delta as i64).clamp(0, max) as usize;
        self.deadline = Some(now + self.manual_timeout);
        events.push(SyncEvent::ScrollTo { index: self.view });
        events
    }

    /// Leave Manual mode and snap back to the line for the latest known
    /// position. No-op outside Manual.
    pub fn resync(&mut self) -> Vec<SyncEvent> {
        if self.mode != Mode::Manual {
            return Vec::new();
        }
        self.deadline = None;
        self.mode = Mode::Synced;

        let mut events = vec![SyncEvent::ModeChanged(Mode::Synced)];
        events.extend(self.recompute());
        // Snap back even when the active index never moved while scrolling.
        if let Some(index) = self.active {
            if !events
                .iter()
                .any(|e| matches!(e, SyncEvent::ScrollTo { .. }))
            {
                events.push(SyncEvent::ScrollTo { index });
            }
        }
        events
    }

    /// Drive the inactivity timeout. Resyncs when the deadline passed.
    pub fn tick(&mut self, now: Instant) -> Vec<SyncEvent> {
        match self.deadline {
            Some(deadline) if self.mode == Mode::Manual && now >= deadline => self.resync(),
            _ => Vec::new(),
        }
    }

    fn recompute(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        if self.lines.is_empty() {
            return events;
        }

        let adjusted = self.last_progress_ms as i64 - self.offset_ms;
        // Scan from the end: of several lines sharing a timestamp, the
        // last one in stable-sort order wins.
        let active = self
            .lines
            .iter()
            .rposition(|l| l.time_ms as i64 <= adjusted);

        if active == self.active {
            return events;
        }

        events.push(SyncEvent::LineChanged {
            previous: self.active,
            current: active,
        });
        self.active = active;

        if !self.started && active.is_some() {
            self.started = true;
            self.mode = Mode::Synced;
            events.push(SyncEvent::ModeChanged(Mode::Synced));
            events.push(SyncEvent::Revealed);
        }

        if self.mode == Mode::Synced {
            if let Some(index) = active {
                events.push(SyncEvent::ScrollTo { index });
            }
        }
        events
    }
}
