use super::pcm::{decoded_base64_len, BYTES_PER_SAMPLE};

/// Seconds of mono 16-bit audio held in `payload_len` bytes. Not rounded.
/// A zero rate yields zero rather than infinity.
pub fn estimate_duration(payload_len: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    (payload_len as f64 / BYTES_PER_SAMPLE as f64) / f64::from(sample_rate)
}

/// Same estimate taken straight from base64 text, without decoding it.
pub fn estimate_duration_base64(encoded: &str, sample_rate: u32) -> f64 {
    estimate_duration(decoded_base64_len(encoded), sample_rate)
}
