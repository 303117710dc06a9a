//! Segment-level direction, script and language (spec §3).
//!
//! Line breaking, paragraph layout and bidi *resolution* are out of scope
//! (spec's Non-goals): the caller has already split text into runs of a
//! single direction/script/language before handing it to a [`crate::Buffer`],
//! and this module is just the record of those three properties plus the
//! `Direction` arithmetic shaping needs (horizontal vs. vertical, is-backward).

use crate::unicode::Script;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Invalid,
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl Direction {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::TopToBottom | Direction::BottomToTop)
    }

    pub fn is_backward(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::BottomToTop)
    }

    pub fn is_valid(self) -> bool {
        self != Direction::Invalid
    }

    pub fn reverse(self) -> Direction {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
            Direction::TopToBottom => Direction::BottomToTop,
            Direction::BottomToTop => Direction::TopToBottom,
            Direction::Invalid => Direction::Invalid,
        }
    }
}

/// BCP-47 language tag. Compared case-insensitively (spec §3) since tags
/// are conventionally lowercase but callers may hand us mixed case.
#[derive(Debug, Clone, Default)]
pub struct Language(pub String);

impl Language {
    pub fn from_str(s: &str) -> Language {
        Language(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}
impl Eq for Language {}

/// The three segment-level properties a buffer carries into plan
/// compilation and shaping (spec §3, §4.2 step 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentProperties {
    pub direction: Direction,
    pub script: Script,
    pub language: Language,
}

impl Default for SegmentProperties {
    fn default() -> Self {
        SegmentProperties {
            direction: Direction::Invalid,
            script: Script::UNKNOWN,
            language: Language::default(),
        }
    }
}

impl SegmentProperties {
    pub fn new(direction: Direction, script: Script, language: Language) -> Self {
        SegmentProperties { direction, script, language }
    }

    /// True once direction/script/language have all been set to something
    /// other than their unset defaults (spec §4.2: plan compilation
    /// requires this before it can pick a complex shaper).
    pub fn is_fully_resolved(&self) -> bool {
        self.direction.is_valid() && self.script.is_real()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_arithmetic() {
        assert!(Direction::LeftToRight.is_horizontal());
        assert!(!Direction::LeftToRight.is_backward());
        assert!(Direction::RightToLeft.is_backward());
        assert_eq!(Direction::LeftToRight.reverse(), Direction::RightToLeft);
    }

    #[test]
    fn language_case_insensitive() {
        assert_eq!(Language::from_str("en-US"), Language::from_str("en-us"));
        assert_ne!(Language::from_str("en"), Language::from_str("fr"));
    }
}
