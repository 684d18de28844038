//! 16-bit mono PCM helpers shared by the batch renderer and live sessions.

use base64::Engine;

use crate::error::AudioError;

/// Rate of synthesized audio (batch output and live inbound).
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
/// Rate of captured audio sent to the remote model.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
pub const BYTES_PER_SAMPLE: usize = 2;

/// Raw little-endian 16-bit mono samples with their sample rate.
///
/// The byte length is expected to be even. Odd lengths are carried through
/// untouched and produce a corrupted trailing sample downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAudio {
    data: Vec<u8>,
    sample_rate: u32,
}

impl RawAudio {
    pub fn from_bytes(data: Vec<u8>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        Self::from_bytes(pcm16_to_bytes(samples), sample_rate)
    }

    /// Decodes base64 text as delivered by the synthesis service. Whitespace
    /// anywhere in the text is ignored.
    pub fn from_base64(encoded: &str, sample_rate: u32) -> Result<Self, AudioError> {
        Ok(Self::from_bytes(decode_base64(encoded)?, sample_rate))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        super::duration::estimate_duration(self.data.len(), self.sample_rate)
    }
}

/// Linear scaling with asymmetric signed-16 range: positive samples scale by
/// 32767, negative by 32768.
pub fn float_to_pcm16(input: &[f32]) -> Vec<i16> {
    input
        .iter()
        .map(|&x| {
            let s = x.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Interprets little-endian 16-bit bytes as samples normalized by 32768.
/// A dangling odd byte is ignored.
pub fn bytes_to_float(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, AudioError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact.as_bytes())?)
}

/// Length in bytes of the payload a base64 string decodes to, without
/// decoding it.
pub fn decoded_base64_len(encoded: &str) -> usize {
    let compact: Vec<u8> = encoded.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let padding = compact.iter().rev().take_while(|&&b| b == b'=').count();
    (compact.len() / 4 * 3 + match compact.len() % 4 {
        2 => 1,
        3 => 2,
        _ => 0,
    })
    .saturating_sub(padding)
}
