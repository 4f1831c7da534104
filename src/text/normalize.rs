//! Text normalization
//!
//! Turns raw extracted text into sentence-level segments: paragraphs are
//! split on blank lines, sentences on Unicode sentence boundaries (UAX #29),
//! whitespace is collapsed and characters engines cannot speak are dropped.
//!
//! Normalization is idempotent: normalizing the text of a normalized unit
//! gives the same unit back.

use super::{Segment, TextUnit};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Blank line (possibly with stray whitespace) between paragraphs
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t\r\f\v]*\n\s*").unwrap());

/// Word split across a line break with a hyphen, e.g. "exam-\nple"
static HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)-\n[ \t]*(\w)").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Upper bound on re-splitting one paragraph
const MAX_RESPLITS: usize = 8;

/// Normalize raw text into a sentence-level [`TextUnit`]
///
/// When `prior` is given, the result is merged with it by segment index:
/// segments the user edited are kept, the rest take the fresh text.
pub fn normalize(raw: &str, prior: Option<&TextUnit>) -> TextUnit {
    let raw = raw.replace("\r\n", "\n").replace('\r', "\n");
    let raw = HYPHEN_BREAK.replace_all(&raw, "$1$2");

    let mut fresh = TextUnit::new();
    let mut paragraph = 0;

    for block in PARAGRAPH_BREAK.split(&raw) {
        let sentences = split_sentences(&clean(block));

        // Paragraphs with nothing to say don't consume a number, so the
        // numbering is the same when the output is normalized again.
        if sentences.is_empty() {
            continue;
        }
        for sentence in sentences {
            fresh.push(paragraph, sentence);
        }
        paragraph += 1;
    }

    debug!(
        "Normalized {} chars into {} segments in {} paragraphs",
        raw.len(),
        fresh.len(),
        paragraph
    );

    match prior {
        Some(prior) => merge(fresh, prior),
        None => fresh,
    }
}

/// Split a cleaned paragraph into speakable sentences
///
/// Dropping a sentence joins its neighbours, and the joined text can break
/// differently ("true. (?) 3 people" becomes "true. 3 people", one
/// sentence). The split is repeated until the kept sentences, joined by a
/// space, give back the text they came from.
fn split_sentences(cleaned: &str) -> Vec<String> {
    let mut text = cleaned.to_string();
    let mut sentences = Vec::new();

    for _ in 0..MAX_RESPLITS {
        sentences = text
            .unicode_sentences()
            .map(str::trim)
            .filter(|s| is_speakable(s))
            .map(str::to_string)
            .collect();

        let joined = sentences.join(" ");
        if joined == text {
            return sentences;
        }
        text = joined;
    }

    debug!("Sentence split did not settle after {} passes", MAX_RESPLITS);
    sentences
}

/// Drop unspeakable characters and collapse whitespace
fn clean(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() || c.is_control() {
                Some(' ')
            } else if is_unspeakable(c) {
                None
            } else {
                Some(c)
            }
        })
        .collect();

    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Format characters, replacement glyphs and private-use code points
fn is_unspeakable(c: char) -> bool {
    matches!(c,
        '\u{00AD}'
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{FEFF}'
        | '\u{FFFD}'
        | '\u{E000}'..='\u{F8FF}')
}

/// A segment is only worth synthesizing if it has a letter or digit
fn is_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

fn merge(fresh: TextUnit, prior: &TextUnit) -> TextUnit {
    let fresh_len = fresh.len();
    let mut merged: Vec<Segment> = Vec::with_capacity(fresh_len.max(prior.len()));

    for seg in fresh.segments {
        match prior.get(seg.index) {
            Some(old) if old.edited => merged.push(old.clone()),
            Some(old) => merged.push(Segment {
                voice: old.voice.clone(),
                ..seg
            }),
            None => merged.push(seg),
        }
    }

    // User-added text past the end of the fresh extraction is kept
    merged.extend(
        prior
            .segments()
            .iter()
            .skip(fresh_len)
            .filter(|s| s.edited)
            .cloned(),
    );

    debug!(
        "Merged {} fresh segments with {} prior segments",
        fresh_len,
        prior.len()
    );
    TextUnit::from_segments(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::VoiceOverride;

    fn texts(unit: &TextUnit) -> Vec<&str> {
        unit.segments().iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_sentence_split() {
        let unit = normalize("Hello there. How are you? Fine!", None);
        assert_eq!(texts(&unit), vec!["Hello there.", "How are you?", "Fine!"]);
        assert!(unit.segments().iter().all(|s| s.paragraph == 0));
    }

    #[test]
    fn test_spanish_punctuation() {
        let unit = normalize("¿Dónde está la biblioteca? ¡Allí! Gracias.", None);
        assert_eq!(
            texts(&unit),
            vec!["¿Dónde está la biblioteca?", "¡Allí!", "Gracias."]
        );
    }

    #[test]
    fn test_paragraphs_and_whitespace() {
        let raw = "First   line\nwrapped here.\n\n  \n\nSecond\tparagraph.";
        let unit = normalize(raw, None);
        assert_eq!(texts(&unit), vec!["First line wrapped here.", "Second paragraph."]);
        assert_eq!(unit.get(0).unwrap().paragraph, 0);
        assert_eq!(unit.get(1).unwrap().paragraph, 1);
    }

    #[test]
    fn test_strips_control_characters() {
        let unit = normalize("Bad\u{0007}\u{200B} char\u{FFFD}s here.", None);
        assert_eq!(texts(&unit), vec!["Bad chars here."]);
    }

    #[test]
    fn test_joins_hyphenated_line_breaks() {
        let unit = normalize("An exam-\nple of wrapping.", None);
        assert_eq!(texts(&unit), vec!["An example of wrapping."]);
    }

    #[test]
    fn test_drops_unspeakable_segments() {
        let unit = normalize("• • •\n\n-----\n\nReal text.", None);
        assert_eq!(texts(&unit), vec!["Real text."]);
        assert_eq!(unit.get(0).unwrap().paragraph, 0);
    }

    #[test]
    fn test_idempotent() {
        let raw = "Dr. Smith arrived at 5 p.m. yesterday. He said: \"Hi!\" Then left.\n\n\
                   Second paragraph... with ellipsis. And more?\n\nÚltimo párrafo.";
        let once = normalize(raw, None);
        let twice = normalize(&once.to_text(), None);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dropped_sentence_does_not_change_the_split() {
        let once = normalize("Is it true. (?) 3 people said so.", None);
        assert_eq!(texts(&once), vec!["Is it true. 3 people said so."]);
        assert_eq!(normalize(&once.to_text(), None), once);
    }

    /// Small xorshift generator so the inputs are the same on every run
    struct Rng(u64);

    impl Rng {
        fn next(&mut self) -> usize {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0 as usize
        }
    }

    #[test]
    fn test_idempotent_on_generated_text() {
        const PIECES: &[&str] = &[
            "word", "Word", "people", "3", "42.", "a.", "Dr.", "U.S.", "e.g.", "(?)", "...",
            "!", "?", ".", "•", "-----", "¿Qué?", "¡Sí!", "\"Hi.\"", ")", "x-\ny", "\n", "\n\n",
            "\u{200B}", "\u{FFFD}", "said so.", "Fin.",
        ];

        let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
        for case in 0..5000 {
            let len = 1 + rng.next() % 14;
            let mut raw = String::new();
            for _ in 0..len {
                raw.push_str(PIECES[rng.next() % PIECES.len()]);
                if rng.next() % 4 != 0 {
                    raw.push(' ');
                }
            }

            let once = normalize(&raw, None);
            let twice = normalize(&once.to_text(), None);
            assert_eq!(once, twice, "case {}: {:?}", case, raw);
        }
    }

    #[test]
    fn test_merge_keeps_edits() {
        let raw = "One. Two. Three.";
        let mut edited = normalize(raw, None);
        edited.edit(1, "Deux.");

        let merged = normalize(raw, Some(&edited));
        assert_eq!(texts(&merged), vec!["One.", "Deux.", "Three."]);
        assert!(merged.get(1).unwrap().edited);
        assert!(!merged.get(0).unwrap().edited);
    }

    #[test]
    fn test_merge_keeps_overrides_and_added_text() {
        let mut prior = normalize("One. Two.", None);
        prior.segments[0].voice = Some(VoiceOverride {
            engine: None,
            voice: Some("en-GB".into()),
        });
        prior.push(0, "Added by hand.");
        prior.edit(2, "Added by hand.");

        let merged = normalize("Uno. Dos.", Some(&prior));
        assert_eq!(texts(&merged), vec!["Uno.", "Dos.", "Added by hand."]);
        assert_eq!(
            merged.get(0).unwrap().voice.as_ref().unwrap().voice.as_deref(),
            Some("en-GB")
        );
        assert_eq!(merged.get(2).unwrap().index, 2);
    }

    #[test]
    fn test_merge_idempotent() {
        let mut prior = normalize("A b c. D e f.", None);
        prior.edit(0, "Edited.");
        let once = normalize("A b c. D e f.", Some(&prior));
        let twice = normalize("A b c. D e f.", Some(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize("", None).is_empty());
        assert!(normalize("   \n\n\t", None).is_empty());
    }
}
