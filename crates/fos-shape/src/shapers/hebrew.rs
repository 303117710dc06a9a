//! Hebrew (spec §4.5 Hebrew family). Hebrew has no joining behavior and
//! needs no syllable segmentation; the generic normalize pass already
//! reorders niqqud (combining marks) by canonical combining class and the
//! default `mark`/`mkmk` GPOS features attach them, so this shaper adds
//! nothing beyond the trait defaults. Kept as its own [`ComplexShaper`]
//! (rather than routing Hebrew to [`super::default::DefaultShaper`]) so a
//! future presentation-form or dagesh-specific pass has a natural home,
//! matching how the teacher's own script table gives Hebrew a distinct
//! entry from Latin-style scripts even where behavior currently overlaps.

use super::ComplexShaper;

pub struct HebrewShaper;

impl ComplexShaper for HebrewShaper {}
