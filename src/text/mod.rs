//! Editable text buffer
//!
//! A [`TextUnit`] is the ordered list of speakable segments that flows from
//! extraction, through the editor surface, into synthesis. Segment order is
//! the document order and is never rearranged.

pub mod normalize;

pub use normalize::normalize;

use crate::speech::EngineKind;
use crate::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-segment engine/voice choice that overrides the job configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VoiceOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// One speakable unit of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the unit, contiguous from 0
    pub index: usize,

    /// Paragraph the segment belongs to
    #[serde(default)]
    pub paragraph: usize,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceOverride>,

    /// Set by the editor when the user changed this segment
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub edited: bool,
}

impl Segment {
    pub fn new(index: usize, paragraph: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            paragraph,
            text: text.into(),
            voice: None,
            edited: false,
        }
    }
}

/// Ordered sequence of speakable segments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextUnit {
    segments: Vec<Segment>,
}

impl TextUnit {
    /// Create an empty unit
    pub fn new() -> Self {
        Self::default()
    }

    /// One segment per paragraph, in the given order
    pub fn from_paragraphs<I, S>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = paragraphs
            .into_iter()
            .enumerate()
            .map(|(i, p)| Segment::new(i, i, p))
            .collect();
        Self { segments }
    }

    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        let mut unit = Self { segments };
        unit.renumber();
        unit
    }

    /// Append a segment at the end
    pub fn push(&mut self, paragraph: usize, text: impl Into<String>) {
        let index = self.segments.len();
        self.segments.push(Segment::new(index, paragraph, text));
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Mutable access for the editor surface
    ///
    /// Text may be changed in place; the order is owned by the unit.
    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segments.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Replace a segment's text and mark it as a user edit
    pub fn edit(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.segments.get_mut(index) {
            Some(seg) => {
                seg.text = text.into();
                seg.edited = true;
                true
            }
            None => false,
        }
    }

    /// Paragraph texts, sentences of one paragraph joined by a space
    pub fn paragraphs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut current: Option<usize> = None;

        for seg in &self.segments {
            if current == Some(seg.paragraph) {
                if let Some(last) = out.last_mut() {
                    last.push(' ');
                    last.push_str(&seg.text);
                }
            } else {
                out.push(seg.text.clone());
                current = Some(seg.paragraph);
            }
        }

        out
    }

    /// Plain text with paragraphs separated by blank lines
    pub fn to_text(&self) -> String {
        self.paragraphs().join("\n\n")
    }

    /// Keep indices contiguous after structural changes
    fn renumber(&mut self) {
        for (i, seg) in self.segments.iter_mut().enumerate() {
            seg.index = i;
        }
    }

    /// Load a unit saved by [`TextUnit::save`]
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading text unit from {:?}", path);
        let data = fs::read_to_string(path)?;
        let unit: TextUnit = serde_json::from_str(&data)?;
        Ok(Self::from_segments(unit.segments))
    }

    /// Save as pretty JSON for the editor surface
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving {} segments to {:?}", self.len(), path);
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}
