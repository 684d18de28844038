use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// The local person at the microphone.
    User,
    /// The remote model.
    Agent,
}

/// One transcription fragment exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Arrival position, starting at 0.
    pub seq: u64,
    pub speaker: Speaker,
    pub text: String,
}

/// Append-only log of fragments in arrival order. Fragments are never
/// merged, reordered or deduplicated.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, speaker: Speaker, text: String) -> TranscriptEntry {
        let entry = TranscriptEntry {
            seq: self.entries.len() as u64,
            speaker,
            text,
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
