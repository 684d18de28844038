//! Boundary with the remote conversation channel. The envelope that
//! multiplexes audio with control messages belongs to the connector; a
//! session only sends [`MediaChunk`]s and receives [`ChannelEvent`]s.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

use crate::audio::pcm::encode_base64;
use crate::error::SessionError;

/// Base64 PCM plus its declared format, e.g. `audio/pcm;rate=16000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

/// Anything the remote side sends. All parts are optional and independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundMessage {
    /// Base64 16-bit PCM at the output rate.
    pub audio: Option<String>,
    /// What the remote heard the user say.
    pub input_transcription: Option<String>,
    /// What the remote model said.
    pub output_transcription: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(InboundMessage),
    Closed,
    Error(String),
}

/// An open remote channel.
pub struct ChannelLink {
    pub outbound: mpsc::UnboundedSender<MediaChunk>,
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChannelLink, SessionError>> + Send + 'a>>;

/// Opens the remote channel. Resolves once the remote is ready to exchange
/// audio.
pub trait RemoteConnector: Send {
    fn connect(&mut self) -> ConnectFuture<'_>;
}

/// In-process connector. The paired [`RemoteEnd`] plays the remote model.
pub struct LoopbackConnector {
    link: Option<ChannelLink>,
    refuse: Option<String>,
}

/// Remote side of a loopback channel.
pub struct RemoteEnd {
    pub received: mpsc::UnboundedReceiver<MediaChunk>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

pub fn loopback() -> (LoopbackConnector, RemoteEnd) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (ev_tx, ev_rx) = mpsc::unbounded_channel();
    let connector = LoopbackConnector {
        link: Some(ChannelLink {
            outbound: out_tx,
            inbound: ev_rx,
        }),
        refuse: None,
    };
    let remote = RemoteEnd {
        received: out_rx,
        events: ev_tx,
    };
    (connector, remote)
}

impl LoopbackConnector {
    /// A connector whose channel never opens.
    pub fn refusing(reason: &str) -> Self {
        Self {
            link: None,
            refuse: Some(reason.to_string()),
        }
    }
}

impl RemoteConnector for LoopbackConnector {
    fn connect(&mut self) -> ConnectFuture<'_> {
        let link = self.link.take();
        let refuse = self.refuse.clone();
        Box::pin(async move {
            if let Some(reason) = refuse {
                return Err(SessionError::ChannelRefused(reason));
            }
            link.ok_or_else(|| SessionError::ChannelRefused("loopback already used".into()))
        })
    }
}

impl RemoteEnd {
    pub fn send(&self, message: InboundMessage) -> bool {
        self.events.send(ChannelEvent::Message(message)).is_ok()
    }

    /// Sends raw 16-bit PCM bytes as one audio chunk.
    pub fn send_audio(&self, pcm: &[u8]) -> bool {
        self.send(InboundMessage {
            audio: Some(encode_base64(pcm)),
            ..Default::default()
        })
    }

    pub fn send_input_transcription(&self, text: &str) -> bool {
        self.send(InboundMessage {
            input_transcription: Some(text.to_string()),
            ..Default::default()
        })
    }

    pub fn send_output_transcription(&self, text: &str) -> bool {
        self.send(InboundMessage {
            output_transcription: Some(text.to_string()),
            ..Default::default()
        })
    }

    pub fn close(&self) {
        let _ = self.events.send(ChannelEvent::Closed);
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.events.send(ChannelEvent::Error(reason.to_string()));
    }
}
