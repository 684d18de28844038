use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::audio::playback::{AudioOutput, SourceId};
use crate::error::SessionError;

/// Placement of one inbound chunk on the output clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledUnit {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
    /// The clock had already passed the cursor, so an audible gap precedes
    /// this unit.
    pub after_gap: bool,
}

impl ScheduledUnit {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Gap-free sequential playback of inbound chunks.
///
/// Owns the schedule cursor (earliest start for the next chunk) and the set
/// of units started but not yet finished. Callers serialize access; the
/// session keeps it behind a mutex.
pub struct PlaybackScheduler {
    output: Box<dyn AudioOutput>,
    sample_rate: u32,
    cursor: f64,
    next_id: u64,
    active: HashMap<SourceId, ScheduledUnit>,
    open: bool,
    scheduled_total: u64,
    gap_total: u64,
}

impl PlaybackScheduler {
    pub fn new(output: Box<dyn AudioOutput>, sample_rate: u32) -> Self {
        Self {
            output,
            sample_rate,
            cursor: 0.0,
            next_id: 0,
            active: HashMap::new(),
            open: false,
            scheduled_total: 0,
            gap_total: 0,
        }
    }

    pub fn open(&mut self, finished: mpsc::UnboundedSender<SourceId>) -> Result<(), SessionError> {
        self.output.open(self.sample_rate, finished)?;
        self.open = true;
        self.reset_cursor();
        Ok(())
    }

    /// Moves the cursor to the current output clock time.
    pub fn reset_cursor(&mut self) {
        self.cursor = self.output.current_time();
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn now(&self) -> f64 {
        self.output.current_time()
    }

    /// Starts `samples` at `max(now, cursor)` and advances the cursor by the
    /// chunk's exact length in samples. Returns `None` once the output is
    /// closed, in which case nothing is started or tracked.
    pub fn schedule(&mut self, samples: Vec<f32>) -> Option<ScheduledUnit> {
        if !self.open {
            debug!("Dropping {} samples: playback closed", samples.len());
            return None;
        }
        let now = self.output.current_time();
        let after_gap = now > self.cursor;
        let start = now.max(self.cursor);
        let duration = samples.len() as f64 / f64::from(self.sample_rate);

        let id = SourceId(self.next_id);
        self.next_id += 1;

        self.output.start_source(id, start, samples);
        self.cursor = start + duration;

        let unit = ScheduledUnit {
            id,
            start,
            duration,
            after_gap,
        };
        self.active.insert(id, unit);
        self.scheduled_total += 1;
        if after_gap {
            self.gap_total += 1;
        }
        debug!(
            "Scheduled {:?} at {:.3}s for {:.3}s (cursor {:.3}s, gap: {})",
            id, start, duration, self.cursor, after_gap
        );
        Some(unit)
    }

    /// Deregisters a unit that finished on its own.
    pub fn complete(&mut self, id: SourceId) -> Option<ScheduledUnit> {
        self.active.remove(&id)
    }

    /// Forcibly stops every unit still playing. Returns how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let count = self.active.len();
        for id in self.active.keys() {
            self.output.stop_source(*id);
        }
        self.active.clear();
        count
    }

    /// Stops everything and releases the output. The cursor is left as is.
    pub fn close(&mut self) {
        let stopped = self.stop_all();
        if self.open {
            self.output.close();
            self.open = false;
            debug!("Playback closed, {} unit(s) stopped", stopped);
        }
    }

    pub fn is_active(&self, id: SourceId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total
    }

    pub fn gap_total(&self) -> u64 {
        self.gap_total
    }
}
