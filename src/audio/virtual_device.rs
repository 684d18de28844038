//! Deviceless input and output used for headless sessions and tests.
//! Both are cheap clonable handles; the clone kept by the caller drives the
//! clock or injects capture frames while the session owns the other.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::capture::AudioInput;
use super::playback::{AudioOutput, SourceId};
use crate::error::SessionError;

/// One `start_source` call as seen by the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRecord {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
    pub sample_count: usize,
}

impl PlaybackRecord {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Default)]
struct OutputState {
    refuse: Option<String>,
    sample_rate: u32,
    now: f64,
    open: bool,
    close_calls: usize,
    finished: Option<mpsc::UnboundedSender<SourceId>>,
    playing: BTreeMap<SourceId, PlaybackRecord>,
    history: Vec<PlaybackRecord>,
    stopped: Vec<SourceId>,
}

/// Output whose clock only moves when [`VirtualOutput::advance`] is called.
#[derive(Clone, Default)]
pub struct VirtualOutput {
    state: Arc<Mutex<OutputState>>,
}

impl VirtualOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// An output whose `open` fails with `reason`.
    pub fn refusing(reason: &str) -> Self {
        let out = Self::default();
        out.lock().refuse = Some(reason.to_string());
        out
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the clock forward and reports every unit that has finished.
    pub fn advance(&self, secs: f64) {
        let mut state = self.lock();
        state.now += secs;
        let now = state.now;
        let done: Vec<SourceId> = state
            .playing
            .values()
            .filter(|r| r.end() <= now + 1e-9)
            .map(|r| r.id)
            .collect();
        for id in done {
            state.playing.remove(&id);
            if let Some(tx) = &state.finished {
                let _ = tx.send(id);
            }
        }
    }

    pub fn now(&self) -> f64 {
        self.lock().now
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    /// Every unit ever started, in start order.
    pub fn history(&self) -> Vec<PlaybackRecord> {
        self.lock().history.clone()
    }

    pub fn playing(&self) -> Vec<SourceId> {
        self.lock().playing.keys().copied().collect()
    }

    pub fn stopped(&self) -> Vec<SourceId> {
        self.lock().stopped.clone()
    }
}

impl AudioOutput for VirtualOutput {
    fn open(
        &mut self,
        sample_rate: u32,
        finished: mpsc::UnboundedSender<SourceId>,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        if let Some(reason) = &state.refuse {
            return Err(SessionError::PlaybackUnavailable(reason.clone()));
        }
        state.sample_rate = sample_rate;
        state.finished = Some(finished);
        state.open = true;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.lock().now
    }

    fn start_source(&mut self, id: SourceId, at: f64, samples: Vec<f32>) {
        let mut state = self.lock();
        if !state.open {
            return;
        }
        let record = PlaybackRecord {
            id,
            start: at,
            duration: samples.len() as f64 / f64::from(state.sample_rate),
            sample_count: samples.len(),
        };
        state.playing.insert(id, record);
        state.history.push(record);
    }

    fn stop_source(&mut self, id: SourceId) {
        let mut state = self.lock();
        if state.playing.remove(&id).is_some() {
            state.stopped.push(id);
        }
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.close_calls += 1;
        state.open = false;
        state.finished = None;
        let leftover: Vec<SourceId> = state.playing.keys().copied().collect();
        state.playing.clear();
        state.stopped.extend(leftover);
    }
}

#[derive(Default)]
struct InputState {
    refuse: Option<String>,
    frames: Option<mpsc::UnboundedSender<Vec<f32>>>,
    frame_len: usize,
    close_calls: usize,
}

/// Input that delivers whatever frames the caller pushes.
#[derive(Clone, Default)]
pub struct VirtualInput {
    state: Arc<Mutex<InputState>>,
}

impl VirtualInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// An input whose `open` fails as if microphone permission was denied.
    pub fn refusing(reason: &str) -> Self {
        let input = Self::default();
        input.lock().refuse = Some(reason.to_string());
        input
    }

    fn lock(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers one captured frame. Returns false once capture is closed.
    pub fn push_frame(&self, frame: Vec<f32>) -> bool {
        match &self.lock().frames {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.lock().frame_len
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().frames.is_some()
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }
}

impl AudioInput for VirtualInput {
    fn open(
        &mut self,
        _sample_rate: u32,
        frame_len: usize,
        frames: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        if let Some(reason) = &state.refuse {
            return Err(SessionError::CaptureUnavailable(reason.clone()));
        }
        state.frame_len = frame_len;
        state.frames = Some(frames);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.close_calls += 1;
        state.frames = None;
    }
}
