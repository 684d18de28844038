//! Script cleaning and caption segmentation. Each pass is a small explicit
//! state machine over `char`s.

use std::mem;

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkupState {
    Text,
    /// Inside `[`, holding the text in case no `]` closes it on this line.
    Direction,
}

/// Replaces every `[...]` stage direction with a space, collapses whitespace
/// runs to one space and trims. A `[` left open at the end of its line is
/// kept verbatim.
pub fn clean_script(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut held = String::new();
    let mut state = MarkupState::Text;

    for c in script.chars() {
        state = match state {
            MarkupState::Text if c == '[' => {
                held.push(c);
                MarkupState::Direction
            }
            MarkupState::Text => {
                out.push(c);
                MarkupState::Text
            }
            MarkupState::Direction if c == ']' => {
                held.clear();
                out.push(' ');
                MarkupState::Text
            }
            MarkupState::Direction if is_line_break(c) => {
                out.push_str(&held);
                out.push(c);
                held.clear();
                MarkupState::Text
            }
            MarkupState::Direction => {
                held.push(c);
                MarkupState::Direction
            }
        };
    }
    out.push_str(&held);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SentenceState {
    /// Nothing collected yet. Terminators here have no sentence to end.
    Leading,
    Body,
    /// After one or more terminators; the next non-terminator opens a new
    /// sentence.
    Terminated,
}

/// Splits on runs of `.`, `!`, `?`, keeping the terminators with their
/// sentence. A trailing fragment without terminator is its own sentence.
/// Sentences are returned untrimmed.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut state = SentenceState::Leading;

    for c in text.chars() {
        state = match (state, is_terminal(c)) {
            (SentenceState::Leading, true) => SentenceState::Leading,
            (SentenceState::Leading, false) | (SentenceState::Body, false) => {
                current.push(c);
                SentenceState::Body
            }
            (SentenceState::Body, true) | (SentenceState::Terminated, true) => {
                current.push(c);
                SentenceState::Terminated
            }
            (SentenceState::Terminated, false) => {
                sentences.push(mem::take(&mut current));
                current.push(c);
                SentenceState::Body
            }
        };
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    // Text made only of terminators still counts as one sentence.
    if sentences.is_empty() && !text.is_empty() {
        sentences.push(text.to_string());
    }
    sentences
}

/// Breaks a sentence into captions of at most `max_chars` characters. Each
/// cut goes after the last comma or before the last whitespace in reach; with
/// neither in reach the cut is made at `max_chars`.
pub fn split_caption(sentence: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = sentence.chars().collect();
    let mut parts = Vec::new();
    let mut rest = &chars[..];

    loop {
        // Whitespace between two captions belongs to neither.
        while let Some((c, tail)) = rest.split_first() {
            if !c.is_whitespace() {
                break;
            }
            rest = tail;
        }
        if rest.is_empty() {
            break;
        }

        let cut = if rest.len() <= max_chars {
            rest.len()
        } else {
            (1..=max_chars)
                .rev()
                .find(|&end| rest[end - 1] == ',' || rest[end].is_whitespace())
                .unwrap_or(max_chars)
        };
        let part: String = rest[..cut].iter().collect();
        let part = part.trim_end();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        rest = &rest[cut..];
    }
    parts
}

/// Full pipeline: clean, split into sentences, split overlong sentences.
/// Returns only non-empty, trimmed segments in script order.
pub fn segment_script(script: &str, max_chars: usize) -> Vec<String> {
    let cleaned = clean_script(script);
    let mut segments = Vec::new();
    for sentence in split_sentences(&cleaned) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if sentence.chars().count() > max_chars {
            segments.extend(split_caption(sentence, max_chars));
        } else {
            segments.push(sentence.to_string());
        }
    }
    segments
}
