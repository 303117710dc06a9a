//! The fallback shaper for scripts with no script-specific behavior (Latin,
//! Cyrillic, Greek, Han, Hiragana/Katakana, and anything unrecognized).
//! Every hook keeps the trait's default, so this exists only to give the
//! "no complex shaping needed" case a name in [`super::ShaperKind`].

use super::ComplexShaper;

pub struct DefaultShaper;

impl ComplexShaper for DefaultShaper {}
