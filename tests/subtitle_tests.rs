use locutor::audio::pcm::{RawAudio, OUTPUT_SAMPLE_RATE};
use locutor::config::SubtitleConfig;
use locutor::render_production;
use locutor::subtitle::segmenter::{clean_script, segment_script, split_caption, split_sentences};
use locutor::subtitle::timeline::{allocate_cues, format_timestamp, render_srt};
use locutor::subtitle::SubtitleTrack;

#[test]
fn test_stage_directions_become_cue_boundaries() {
    let script = "Hola. [pausa] ¿Cómo estás?";
    assert_eq!(clean_script(script), "Hola. ¿Cómo estás?");

    let track = SubtitleTrack::from_script(script, 4.0, 60);
    let cues = track.cues();
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].text, "Hola.");
    assert_eq!(cues[1].text, "¿Cómo estás?");

    // 5 and 12 characters
    let first = 5.0 / 17.0 * 4.0;
    assert_eq!(cues[0].start, 0.0);
    assert!((cues[0].end - first).abs() < 1e-9);
    assert_eq!(cues[1].start, cues[0].end, "Cues are contiguous");
    assert_eq!(cues[1].end, 4.0);

    assert_eq!(
        track.to_srt(),
        "1\n00:00:00,000 --> 00:00:01,176\nHola.\n\n2\n00:00:01,176 --> 00:00:04,000\n¿Cómo estás?\n\n"
    );
}

#[test]
fn test_cues_cover_duration_without_gaps() {
    let script = "[intro] Bienvenidos al programa de hoy. Vamos a hablar de muchas cosas, \
        de música, de cine, de libros y de todo lo que se nos ocurra mientras dure la tarde! \
        ¿Listos? [risas] Empezamos";
    let duration = 37.25;
    let track = SubtitleTrack::from_script(script, duration, 60);
    let cues = track.cues();

    assert!(cues.len() >= 4);
    assert_eq!(cues[0].start, 0.0);
    for pair in cues.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "No gap or overlap between cues");
        assert!(pair[0].end > pair[0].start);
    }
    assert_eq!(cues.last().unwrap().end, duration);

    let total: f64 = cues.iter().map(|c| c.duration()).sum();
    assert!((total - duration).abs() < 1e-9);

    for (i, cue) in cues.iter().enumerate() {
        assert_eq!(cue.index, i + 1, "Indices are 1-based and contiguous");
        assert!(cue.text.chars().count() <= 60);
    }
}

#[test]
fn test_clean_text_is_unchanged() {
    let clean = "Una frase limpia. Otra, con coma! Y una pregunta?";
    assert_eq!(clean_script(clean), clean);
    assert_eq!(clean_script(&clean_script(clean)), clean);
}

#[test]
fn test_whitespace_collapses_and_unclosed_bracket_survives() {
    assert_eq!(clean_script("  uno \n\t dos   "), "uno dos");
    assert_eq!(clean_script("a[b]c"), "a c");
    assert_eq!(clean_script("[a [b] c"), "c");
    assert_eq!(clean_script("sin cierre [nota\nsigue [x] fin"), "sin cierre [nota sigue fin");
    assert_eq!(clean_script("abierto [al final"), "abierto [al final");
}

#[test]
fn test_sentence_splitting() {
    assert_eq!(split_sentences("Uno. Dos"), vec!["Uno.", " Dos"]);
    assert_eq!(split_sentences("¡Hola!! ¿Qué?"), vec!["¡Hola!!", " ¿Qué?"]);
    assert_eq!(split_sentences("...Hola"), vec!["Hola"]);
    assert_eq!(split_sentences("..."), vec!["..."]);
    assert!(split_sentences("").is_empty());

    assert_eq!(segment_script("Uno. Dos", 60), vec!["Uno.", "Dos"]);
}

#[test]
fn test_long_sentence_breaks_at_spaces_and_commas() {
    let sentence = "Esta es una oración bastante larga, que sigue y sigue sin detenerse \
        nunca jamás en ningún momento del día ni de la noche.";
    let parts = split_caption(sentence, 60);

    assert!(parts.len() >= 2);
    for part in &parts {
        assert!(part.chars().count() <= 60, "Part too long: {:?}", part);
        assert_eq!(part.trim(), part);
    }
    assert_eq!(parts.join(" "), sentence, "Nothing is lost or reordered");
}

#[test]
fn test_unbreakable_run_is_hard_cut() {
    let word = "a".repeat(130);
    let parts = split_caption(&word, 60);
    assert_eq!(
        parts.iter().map(|p| p.len()).collect::<Vec<_>>(),
        vec![60, 60, 10]
    );
}

#[test]
fn test_comma_past_the_cap_is_not_kept() {
    // Comma sits at index 60, one past the cap
    let sentence = format!("{},{}", "a".repeat(60), " b".repeat(10));
    let parts = split_caption(&sentence, 60);

    for part in &parts {
        assert!(part.chars().count() <= 60, "Part too long: {:?}", part);
    }
    assert_eq!(parts[0], "a".repeat(60));
    assert_eq!(parts.concat().replace(' ', ""), sentence.replace(' ', ""));
}

#[test]
fn test_break_lands_exactly_on_the_cap() {
    // Space at index 60: the first caption takes all 60 letters
    let sentence = format!("{} {}", "a".repeat(60), "b".repeat(5));
    assert_eq!(split_caption(&sentence, 60), vec!["a".repeat(60), "b".repeat(5)]);

    // Comma at index 59 still fits
    let sentence = format!("{}, {}", "a".repeat(59), "b".repeat(5));
    assert_eq!(
        split_caption(&sentence, 60),
        vec![format!("{},", "a".repeat(59)), "b".repeat(5)]
    );
}

#[test]
fn test_empty_and_markup_only_scripts_yield_no_cues() {
    for script in ["", "   ", "[risa] [pausa]"] {
        let track = SubtitleTrack::from_script(script, 3.0, 60);
        assert!(track.is_empty(), "{:?}", script);
        assert_eq!(track.to_srt(), "");
    }
}

#[test]
fn test_empty_segments_take_no_index_or_time() {
    let segments = vec!["ab".to_string(), String::new(), "cd".to_string()];
    let cues = allocate_cues(&segments, 2.0);
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[1].index, 2);
    assert_eq!(cues[0].end, 1.0);
    assert_eq!(cues[1].end, 2.0);
}

#[test]
fn test_timestamp_format() {
    assert_eq!(format_timestamp(0.0), "00:00:00,000");
    assert_eq!(format_timestamp(3661.5), "01:01:01,500");
    assert_eq!(format_timestamp(59.9996), "00:01:00,000");
    assert_eq!(format_timestamp(1.0004), "00:00:01,000");
    assert_eq!(format_timestamp(-1.0), "00:00:00,000");
}

#[test]
fn test_render_srt_layout() {
    let cues = allocate_cues(&["Uno.".to_string()], 1.5);
    assert_eq!(render_srt(&cues), "1\n00:00:00,000 --> 00:00:01,500\nUno.\n\n");
}

#[test]
fn test_batch_production_runs_encoder_then_timeline() {
    let audio = RawAudio::from_bytes(vec![0u8; 96_000], OUTPUT_SAMPLE_RATE);
    let production = render_production(&audio, "Primera. Segunda.", &SubtitleConfig::default());

    assert_eq!(production.clip.len(), 96_044);
    assert_eq!(production.duration_secs, 2.0);
    assert_eq!(production.subtitles.cues().len(), 2);
    assert_eq!(production.subtitles.cues()[1].end, 2.0);
    assert!(production.srt().starts_with("1\n00:00:00,000 --> "));
}
