//! Canonical 44-byte RIFF/WAVE framing for mono 16-bit PCM.

use super::pcm::RawAudio;

pub const HEADER_LEN: usize = 44;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Header fields, all derived from the payload length and the sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Fields that do not fit in 32 bits saturate at `u32::MAX`.
    pub fn for_payload(data_len: usize, sample_rate: u32) -> Self {
        let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
        Self {
            sample_rate,
            byte_rate: sample_rate.saturating_mul(u32::from(block_align)),
            block_align,
            data_size: u32::try_from(data_len).unwrap_or(u32::MAX),
        }
    }

    /// Size field of the outer RIFF chunk.
    pub fn chunk_size(&self) -> u32 {
        self.data_size.saturating_add(36)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.chunk_size().to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        out[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
        out[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }
}

/// A playable WAV resource: header followed by the untouched sample payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedClip {
    header: WavHeader,
    bytes: Vec<u8>,
}

impl EncodedClip {
    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.data_size == 0
    }
}

/// Wraps `pcm` in a WAV header. The payload length is taken as-is; callers
/// supply whole 16-bit samples.
pub fn encode_wav(pcm: &[u8], sample_rate: u32) -> EncodedClip {
    let header = WavHeader::for_payload(pcm.len(), sample_rate);
    let mut bytes = Vec::with_capacity(HEADER_LEN + pcm.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(pcm);
    EncodedClip { header, bytes }
}

impl RawAudio {
    pub fn encode_wav(&self) -> EncodedClip {
        encode_wav(self.as_bytes(), self.sample_rate())
    }
}
