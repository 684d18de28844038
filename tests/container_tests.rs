use std::io::Cursor;

use locutor::audio::duration::{estimate_duration, estimate_duration_base64};
use locutor::audio::pcm::{
    bytes_to_float, encode_base64, float_to_pcm16, pcm16_to_bytes, RawAudio, OUTPUT_SAMPLE_RATE,
};
use locutor::audio::wav::{encode_wav, WavHeader, HEADER_LEN};

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[test]
fn test_one_second_payload_at_24k() {
    // 48000 bytes = 24000 samples = 1s
    let payload = vec![0u8; 48_000];
    let clip = encode_wav(&payload, OUTPUT_SAMPLE_RATE);
    let bytes = clip.as_bytes();

    assert_eq!(bytes.len(), 48_044, "Container is header + payload");
    assert_eq!(estimate_duration(payload.len(), OUTPUT_SAMPLE_RATE), 1.0);

    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(u32_at(bytes, 4), 36 + 48_000, "RIFF chunk size");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(u32_at(bytes, 16), 16);
    assert_eq!(u16_at(bytes, 20), 1, "PCM format tag");
    assert_eq!(u16_at(bytes, 22), 1, "Mono");
    assert_eq!(u32_at(bytes, 24), 24_000);
    assert_eq!(u32_at(bytes, 28), 48_000, "Byte rate");
    assert_eq!(u16_at(bytes, 32), 2, "Block align");
    assert_eq!(u16_at(bytes, 34), 16, "Bit depth");
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(u32_at(bytes, 40), 48_000, "Data size equals payload length");
}

#[test]
fn test_header_follows_sample_rate() {
    let clip = encode_wav(&[0u8; 320], 16_000);
    assert_eq!(clip.header().sample_rate, 16_000);
    assert_eq!(clip.header().byte_rate, 32_000);
    assert_eq!(clip.header().data_size, 320);
    assert_eq!(clip.len(), 320 + HEADER_LEN);
}

#[test]
fn test_encoded_clip_is_readable_wav() {
    let samples: Vec<i16> = (0..480).map(|i| ((i * 97) % 2000 - 1000) as i16).collect();
    let audio = RawAudio::from_samples(&samples, OUTPUT_SAMPLE_RATE);
    let clip = audio.encode_wav();

    let mut reader = hound::WavReader::new(Cursor::new(clip.as_bytes().to_vec()))
        .expect("encoded clip should parse as WAV");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_rate, OUTPUT_SAMPLE_RATE);

    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(decoded, samples, "Payload must be carried untouched");
    assert_eq!(clip.data(), audio.as_bytes());
}

#[test]
fn test_empty_payload_is_bare_header() {
    let clip = encode_wav(&[], OUTPUT_SAMPLE_RATE);
    assert_eq!(clip.len(), HEADER_LEN);
    assert!(clip.is_empty());
    assert_eq!(u32_at(clip.as_bytes(), 40), 0);
    assert_eq!(u32_at(clip.as_bytes(), 4), 36);
}

#[test]
fn test_odd_payload_length_is_not_corrected() {
    let clip = encode_wav(&[1, 2, 3], OUTPUT_SAMPLE_RATE);
    assert_eq!(clip.header().data_size, 3);
    assert_eq!(clip.len(), 47);
}

#[test]
fn test_duration_is_linear_in_payload() {
    let single = estimate_duration(9_600, OUTPUT_SAMPLE_RATE);
    let double = estimate_duration(19_200, OUTPUT_SAMPLE_RATE);
    assert!((single - 0.2).abs() < 1e-12);
    assert_eq!(double, single * 2.0);
    assert_eq!(estimate_duration(0, OUTPUT_SAMPLE_RATE), 0.0);
    assert_eq!(estimate_duration(1_000, 0), 0.0, "Zero rate is degenerate, not infinite");
}

#[test]
fn test_duration_from_base64_matches_decoded() {
    for len in [0usize, 1, 2, 3, 4, 47, 48_000] {
        let payload = vec![7u8; len];
        let encoded = encode_base64(&payload);
        assert_eq!(
            estimate_duration_base64(&encoded, OUTPUT_SAMPLE_RATE),
            estimate_duration(len, OUTPUT_SAMPLE_RATE),
            "length {}",
            len
        );
    }
}

#[test]
fn test_base64_input_ignores_whitespace() {
    let payload: Vec<u8> = (0..=255).collect();
    let encoded = encode_base64(&payload);
    let wrapped: String = encoded
        .as_bytes()
        .chunks(20)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect::<Vec<_>>()
        .join("\n ");

    let audio = RawAudio::from_base64(&wrapped, OUTPUT_SAMPLE_RATE).unwrap();
    assert_eq!(audio.as_bytes(), &payload[..]);
    assert!(RawAudio::from_base64("not base64 !!", OUTPUT_SAMPLE_RATE).is_err());
}

#[test]
fn test_float_to_pcm16_uses_asymmetric_scale() {
    let pcm = float_to_pcm16(&[1.0, -1.0, 0.0, 0.5, -0.5, 2.0, -3.0]);
    assert_eq!(pcm, vec![32767, -32768, 0, 16383, -16384, 32767, -32768]);
}

#[test]
fn test_pcm_bytes_normalize_by_32768() {
    let bytes = pcm16_to_bytes(&[-32768, 16384, 0]);
    assert_eq!(bytes, vec![0x00, 0x80, 0x00, 0x40, 0x00, 0x00]);

    let samples = bytes_to_float(&bytes);
    assert_eq!(samples, vec![-1.0, 0.5, 0.0]);

    // Dangling byte is ignored
    assert_eq!(bytes_to_float(&[0x00, 0x40, 0x01]).len(), 1);
}

#[test]
fn test_oversized_header_fields_saturate() {
    // byte_rate = rate * 2 does not fit in 32 bits
    let clip = encode_wav(&[0u8; 2], 3_000_000_000);
    assert_eq!(clip.header().byte_rate, u32::MAX);
    assert_eq!(clip.header().sample_rate, 3_000_000_000);
    assert_eq!(clip.len(), HEADER_LEN + 2);

    let header = WavHeader::for_payload(u32::MAX as usize, OUTPUT_SAMPLE_RATE);
    assert_eq!(header.data_size, u32::MAX);
    assert_eq!(header.chunk_size(), u32::MAX, "RIFF size saturates instead of wrapping");
}
