use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use locutor::audio::pcm::RawAudio;
use locutor::config::StudioConfig;
use locutor::error::AudioError;
use locutor::render_production;

const USAGE: &str = "usage: locutor <audio.pcm|audio.b64|audio.wav> <script.txt> <out-stem> [config.json]";

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!(USAGE);
    }
    let audio_path = PathBuf::from(&args[0]);
    let script_path = PathBuf::from(&args[1]);
    let stem = PathBuf::from(&args[2]);

    let config = match args.get(3) {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path))?;
            StudioConfig::from_json_str(&raw)?
        }
        None => StudioConfig::default(),
    };

    let audio = load_audio(&audio_path, config.output_sample_rate)?;
    let script = std::fs::read_to_string(&script_path)
        .with_context(|| format!("reading script {}", script_path.display()))?;

    tracing::info!(
        "Rendering {} ({} bytes at {}Hz)",
        audio_path.display(),
        audio.len_bytes(),
        audio.sample_rate()
    );

    let production = render_production(&audio, &script, &config.subtitle);

    let wav_path = stem.with_extension("wav");
    let srt_path = stem.with_extension("srt");
    std::fs::write(&wav_path, production.clip.as_bytes())
        .with_context(|| format!("writing {}", wav_path.display()))?;
    std::fs::write(&srt_path, production.srt())
        .with_context(|| format!("writing {}", srt_path.display()))?;

    tracing::info!(
        "Wrote {} and {} ({:.3}s)",
        wav_path.display(),
        srt_path.display(),
        production.duration_secs
    );
    Ok(())
}

/// Raw PCM, base64 text as returned by the synthesis service, or a mono
/// 16-bit WAV whose samples are re-framed as-is.
fn load_audio(path: &Path, default_rate: u32) -> Result<RawAudio> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let audio = match extension.as_deref() {
        Some("wav") => {
            let mut reader = hound::WavReader::open(path).map_err(AudioError::from)?;
            let spec = reader.spec();
            if spec.channels != 1
                || spec.bits_per_sample != 16
                || spec.sample_format != hound::SampleFormat::Int
            {
                return Err(AudioError::UnsupportedWav {
                    channels: spec.channels,
                    bits: spec.bits_per_sample,
                }
                .into());
            }
            let samples = reader
                .samples::<i16>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(AudioError::from)?;
            RawAudio::from_samples(&samples, spec.sample_rate)
        }
        Some("b64") | Some("txt") => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            RawAudio::from_base64(&text, default_rate)?
        }
        _ => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            RawAudio::from_bytes(bytes, default_rate)
        }
    };
    Ok(audio)
}
