use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::schedule::PlaybackScheduler;
use super::state::{SessionRequest, SessionState};
use super::transcript::{Speaker, Transcript, TranscriptEntry};
use super::transport::{ChannelEvent, InboundMessage, MediaChunk, RemoteConnector};
use crate::audio::capture::AudioInput;
use crate::audio::pcm::{bytes_to_float, decode_base64, encode_base64, float_to_pcm16, pcm16_to_bytes};
use crate::audio::playback::{AudioOutput, SourceId};
use crate::config::LiveConfig;
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Notifications for whoever renders the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    State(SessionState),
    Transcript(TranscriptEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub chunks_scheduled: u64,
    /// Chunks that started after the clock overtook the cursor.
    pub gaps: u64,
    pub active_sources: usize,
    pub cursor: f64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the session's tasks touch.
struct Shared {
    id: SessionId,
    state: Mutex<SessionState>,
    input: Mutex<Box<dyn AudioInput>>,
    playback: Mutex<PlaybackScheduler>,
    transcript: Mutex<Transcript>,
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    cancel: CancellationToken,
    frames_sent: AtomicU64,
}

impl Shared {
    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn apply(&self, request: SessionRequest) -> Option<SessionState> {
        let next = {
            let mut state = lock(&self.state);
            let next = state.transition(request)?;
            *state = next;
            next
        };
        info!("[{}] Session -> {:?}", self.id, next);
        self.emit(SessionEvent::State(next));
        Some(next)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = lock(&self.events).as_ref() {
            let _ = tx.send(event);
        }
    }

    fn handle_message(&self, message: InboundMessage) {
        if let Some(audio) = message.audio {
            match decode_base64(&audio) {
                Ok(bytes) => match lock(&self.playback).schedule(bytes_to_float(&bytes)) {
                    Some(unit) if unit.after_gap => {
                        debug!("[{}] Playback resumed after a gap at {:.3}s", self.id, unit.start);
                    }
                    Some(_) => {}
                    None => debug!("[{}] Inbound chunk arrived after close", self.id),
                },
                Err(e) => warn!("[{}] Dropping undecodable inbound chunk: {}", self.id, e),
            }
        }
        if let Some(text) = message.output_transcription {
            self.record(Speaker::Agent, text);
        }
        if let Some(text) = message.input_transcription {
            self.record(Speaker::User, text);
        }
    }

    fn record(&self, speaker: Speaker, text: String) {
        if text.is_empty() {
            return;
        }
        let entry = lock(&self.transcript).append(speaker, text);
        debug!("[{}] Transcript #{} from {:?} ({} chars)", self.id, entry.seq, speaker, entry.text.len());
        self.emit(SessionEvent::Transcript(entry));
    }

    /// Releases capture and playback. Idempotent.
    fn shutdown(&self) {
        self.cancel.cancel();
        lock(&self.input).close();
        lock(&self.playback).close();
    }

    /// Transport fault after start: close without surfacing an error.
    fn close_after_fault(&self) {
        self.apply(SessionRequest::Fail);
        self.shutdown();
    }
}

/// One live conversation: microphone frames out, model audio in, scheduled
/// back to back on the output clock.
///
/// Sessions are single-use. After [`LiveSession::stop`] or any failure, build a
/// new one to reconnect.
pub struct LiveSession {
    shared: Arc<Shared>,
    config: LiveConfig,
    connector: Box<dyn RemoteConnector>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveSession {
    pub fn new(
        config: LiveConfig,
        connector: Box<dyn RemoteConnector>,
        input: Box<dyn AudioInput>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        let shared = Shared {
            id: SessionId(Uuid::new_v4()),
            state: Mutex::new(SessionState::Idle),
            input: Mutex::new(input),
            playback: Mutex::new(PlaybackScheduler::new(output, config.output_sample_rate)),
            transcript: Mutex::new(Transcript::new()),
            events: Mutex::new(None),
            cancel: CancellationToken::new(),
            frames_sent: AtomicU64::new(0),
        };
        Self {
            shared: Arc::new(shared),
            config,
            connector,
            tasks: Vec::new(),
        }
    }

    /// Receives state changes and transcript entries from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.events) = Some(tx);
        rx
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        lock(&self.shared.transcript).entries().to_vec()
    }

    pub fn stats(&self) -> SessionStats {
        let playback = lock(&self.shared.playback);
        SessionStats {
            frames_sent: self.shared.frames_sent.load(Ordering::Relaxed),
            chunks_scheduled: playback.scheduled_total(),
            gaps: playback.gap_total(),
            active_sources: playback.active_len(),
            cursor: playback.cursor(),
        }
    }

    /// Opens playback, the remote channel and the microphone, in that order.
    /// On any failure everything already acquired is released and the
    /// session ends up `Closed`.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let from = self.shared.state();
        if self.shared.apply(SessionRequest::Start).is_none() {
            return Err(SessionError::InvalidTransition { from, op: "start" });
        }
        info!("[{}] Connecting", self.shared.id);

        let (finished_tx, finished_rx) = mpsc::unbounded_channel::<SourceId>();
        let opened = lock(&self.shared.playback).open(finished_tx);
        if let Err(e) = opened {
            return Err(self.fail(e));
        }

        let link = match self.connector.connect().await {
            Ok(link) => link,
            Err(e) => return Err(self.fail(e)),
        };

        let (frames_tx, frames_rx) = mpsc::unbounded_channel::<Vec<f32>>();
        let capturing = lock(&self.shared.input).open(
            self.config.input_sample_rate,
            self.config.capture_frame_len,
            frames_tx,
        );
        if let Err(e) = capturing {
            return Err(self.fail(e));
        }

        lock(&self.shared.playback).reset_cursor();
        self.shared.apply(SessionRequest::Ready);

        self.tasks.push(tokio::spawn(forward_capture(
            self.shared.clone(),
            frames_rx,
            link.outbound,
            self.config.input_mime_type(),
        )));
        self.tasks.push(tokio::spawn(receive_remote(self.shared.clone(), link.inbound)));
        self.tasks.push(tokio::spawn(reap_finished(self.shared.clone(), finished_rx)));
        Ok(())
    }

    fn fail(&self, error: SessionError) -> SessionError {
        warn!("[{}] Session failed to start: {}", self.shared.id, error);
        self.shared.apply(SessionRequest::Fail);
        self.shared.shutdown();
        error
    }

    /// Stops capture, silences everything still scheduled and releases the
    /// devices. Safe to call any number of times, in any state. Transcript
    /// and cursor are left as they were.
    pub fn stop(&mut self) {
        self.shared.apply(SessionRequest::Stop);
        self.shared.shutdown();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Converts one captured frame into a transport chunk.
pub fn encode_frame(frame: &[f32], mime_type: &str) -> MediaChunk {
    let pcm = float_to_pcm16(frame);
    MediaChunk {
        mime_type: mime_type.to_string(),
        data: encode_base64(&pcm16_to_bytes(&pcm)),
    }
}

async fn forward_capture(
    shared: Arc<Shared>,
    mut frames: mpsc::UnboundedReceiver<Vec<f32>>,
    outbound: mpsc::UnboundedSender<MediaChunk>,
    mime_type: String,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        if outbound.send(encode_frame(&frame, &mime_type)).is_err() {
            warn!("[{}] Remote channel gone; closing session", shared.id);
            shared.close_after_fault();
            break;
        }
        shared.frames_sent.fetch_add(1, Ordering::Relaxed);
    }
}

async fn receive_remote(shared: Arc<Shared>, mut inbound: mpsc::UnboundedReceiver<ChannelEvent>) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            event = inbound.recv() => event,
        };
        match event {
            Some(ChannelEvent::Message(message)) => shared.handle_message(message),
            Some(ChannelEvent::Error(reason)) => {
                warn!("[{}] Remote channel error: {}", shared.id, reason);
                shared.close_after_fault();
                break;
            }
            Some(ChannelEvent::Closed) | None => {
                info!("[{}] Remote channel closed", shared.id);
                shared.close_after_fault();
                break;
            }
        }
    }
}

async fn reap_finished(shared: Arc<Shared>, mut finished: mpsc::UnboundedReceiver<SourceId>) {
    loop {
        let id = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            id = finished.recv() => match id {
                Some(id) => id,
                None => break,
            },
        };
        lock(&shared.playback).complete(id);
    }
}
