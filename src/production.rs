use tracing::info;

use crate::audio::pcm::RawAudio;
use crate::audio::wav::EncodedClip;
use crate::config::SubtitleConfig;
use crate::subtitle::SubtitleTrack;

/// Finished batch render: playable clip plus its estimated captions.
#[derive(Debug, Clone, PartialEq)]
pub struct Production {
    pub clip: EncodedClip,
    pub duration_secs: f64,
    pub subtitles: SubtitleTrack,
}

impl Production {
    pub fn srt(&self) -> String {
        self.subtitles.to_srt()
    }
}

/// Encodes `audio` and times `script` over its duration.
pub fn render_production(audio: &RawAudio, script: &str, config: &SubtitleConfig) -> Production {
    let clip = audio.encode_wav();
    let duration_secs = audio.duration_secs();
    let subtitles = SubtitleTrack::from_script(script, duration_secs, config.max_caption_chars);

    info!(
        "Rendered production: {} bytes, {:.3}s, {} cues",
        clip.len(),
        duration_secs,
        subtitles.cues().len()
    );

    Production {
        clip,
        duration_secs,
        subtitles,
    }
}
