use std::fmt::Write as _;

use super::segmenter::segment_script;

/// One timed caption. Times are seconds from the start of the clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Spreads `total_duration` over the segments in proportion to their
/// character counts. Cues are contiguous from zero and the last one ends
/// exactly at `total_duration`. Empty segments get neither a cue nor time.
pub fn allocate_cues(segments: &[String], total_duration: f64) -> Vec<Cue> {
    let total_chars: usize = segments.iter().map(|s| s.chars().count()).sum();
    let mut cues: Vec<Cue> = Vec::with_capacity(segments.len());
    let mut cursor = 0.0;

    for text in segments.iter().filter(|s| !s.is_empty()) {
        let span = if total_chars > 0 {
            text.chars().count() as f64 / total_chars as f64 * total_duration
        } else {
            total_duration
        };
        let start = cursor;
        let end = start + span;
        cues.push(Cue {
            index: cues.len() + 1,
            start,
            end,
            text: text.clone(),
        });
        cursor = end;
    }

    if let Some(last) = cues.last_mut() {
        last.end = total_duration;
    }
    cues
}

/// `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let secs = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

pub fn render_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for cue in cues {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.text
        );
    }
    out
}

/// Caption track estimated from a script and the clip length.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTrack {
    cues: Vec<Cue>,
    duration: f64,
}

impl SubtitleTrack {
    pub fn from_script(script: &str, duration: f64, max_caption_chars: usize) -> Self {
        let segments = segment_script(script, max_caption_chars);
        Self {
            cues: allocate_cues(&segments, duration),
            duration,
        }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn to_srt(&self) -> String {
        render_srt(&self.cues)
    }
}
