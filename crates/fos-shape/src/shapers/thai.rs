//! Thai/Lao (spec §4.5 Thai family). Thai text already encodes vowel
//! signs and tone marks in visual (left-to-right) order — unlike the
//! Indic family, there is no pre-base matra to move — so this shaper's
//! only job is making sure stacked combining marks (a tone mark above a
//! vowel sign above a consonant) don't get a spurious dotted-circle
//! insertion when there's no preceding base in the immediate sense the
//! generic normalizer checks, and that mark advances zero out before
//! GPOS mark attachment runs. No teacher file covers Thai; grounded on
//! the same `is_mark`/combining-class primitives the normalizer
//! ([`crate::normalize`]) already established.

use super::{ComplexShaper, ZeroMarksPolicy};

pub struct ThaiShaper;

impl ComplexShaper for ThaiShaper {
    fn zero_width_marks(&self) -> ZeroMarksPolicy {
        ZeroMarksPolicy::Before
    }
}
