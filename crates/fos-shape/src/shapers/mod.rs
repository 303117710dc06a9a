//! Complex shapers (C4, spec §4.5).
//!
//! Each script family gets a [`ComplexShaper`] implementation selected by
//! [`ShaperKind::for_script`]; the driver calls its hooks at the points
//! spec §4.3 names (`preprocess_text` before normalization finishes,
//! `setup_masks` before GSUB, `postprocess_glyphs` after GSUB but before
//! positioning). Grounded module-by-module on
//! `engine/fos-text/src/shaping/{arabic,indic,script}.rs` — the only
//! shaper the teacher carried past a stub.

mod default;
mod arabic;
mod hangul;
mod hebrew;
mod indic;
mod khmer;
mod myanmar;
mod thai;
mod tibetan;
mod use_shaper;

use crate::buffer::Buffer;
use crate::normalize::NormalizationPreference;
use crate::plan::{FeatureMap, PlanBuilder};
use crate::unicode::Script;
use unicode_script::Script as UScript;

/// How a shaper wants zero-advance-width marks handled after positioning
/// (spec §4.3 step 5, `zero_width_marks`/`ZERO_MARKS` plan flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroMarksPolicy {
    /// Leave advances untouched (AAT `morx`/`kerx` fonts position marks
    /// themselves; zeroing would double-count).
    None,
    /// Zero a mark's advance before GPOS attachment runs.
    Before,
    /// Zero a mark's advance after GPOS attachment has positioned it.
    After,
}

/// The per-script hooks a shaping pass calls into (spec §4.5: "a complex
/// shaper customizes feature selection, mask setup, and pre/post
/// processing around the generic GSUB/GPOS/AAT passes").
pub trait ComplexShaper: Sync {
    /// Register the features this script always wants (spec §4.2 step 1,
    /// `collect_features`). Default: no script-specific additions.
    fn collect_features(&self, _builder: &mut PlanBuilder) {}

    /// Final say after the font/user feature merge (spec §4.2 step 1,
    /// `override_features`) — e.g. Arabic forcing `liga`/`clig` off so its
    /// own joining forms aren't double-substituted by generic ligatures.
    fn override_features(&self, _builder: &mut PlanBuilder) {}

    /// Decomposition/composition policy for the normalize pass (spec §4.3
    /// step 2).
    fn normalization_preference(&self) -> NormalizationPreference {
        NormalizationPreference::ComposedDiacritics
    }

    /// Script-specific text-level preprocessing before normalization
    /// finishes (spec §4.3 step 1/step "shaper preprocess") — e.g.
    /// Hangul's algorithmic jamo decomposition.
    fn preprocess_text(&self, _buffer: &mut Buffer) {}

    /// Assign per-glyph feature mask bits the static global/ranged model
    /// can't express — positional joining forms, syllable-relative
    /// features (spec §4.3 step 3, `setup_masks`). `gsub_map` resolves a
    /// feature tag to the mask bit the plan allocated it, if the font
    /// actually carries lookups for it.
    fn setup_masks(&self, _buffer: &mut Buffer, _gsub_map: &FeatureMap) {}

    /// Glyph-level cleanup after GSUB, before positioning (spec §4.3 step
    /// 4, `postprocess_glyphs`) — e.g. syllable-based cluster merging for
    /// the Indic-family scripts.
    fn postprocess_glyphs(&self, _buffer: &mut Buffer) {}

    fn zero_width_marks(&self) -> ZeroMarksPolicy {
        ZeroMarksPolicy::Before
    }

    /// Does this script need the fallback (GDEF/heuristic) mark
    /// positioning pass when the font has no GPOS mark lookups?
    fn fallback_position(&self) -> bool {
        true
    }

    /// Prefer an AAT `morx` table over GSUB when the font has both (spec
    /// §4.2 step 5) — true for scripts whose best-known fonts are
    /// AAT-first (historically Arabic/Indic on the platform the teacher's
    /// AAT detection code targets). Kept conservative: false by default.
    fn prefer_morx(&self) -> bool {
        false
    }
}

/// Which complex shaper a run's script selects (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaperKind {
    Default,
    Arabic,
    Hangul,
    Hebrew,
    Indic,
    Khmer,
    Myanmar,
    Thai,
    Tibetan,
    Use,
}

impl ShaperKind {
    /// Route a script to its complex shaper (spec §4.5). Mirrors the
    /// teacher's `script.rs` script-tag table for which scripts it groups
    /// together; scripts with no dedicated shaper fall back to `Use`, the
    /// universal-shaping-engine style default for otherwise-unhandled
    /// complex scripts, or to `Default` for simple scripts.
    pub fn for_script(script: Script) -> ShaperKind {
        match script.0 {
            UScript::Arabic | UScript::Syriac | UScript::Nko | UScript::Mandaic | UScript::Adlam => {
                ShaperKind::Arabic
            }
            UScript::Hangul => ShaperKind::Hangul,
            UScript::Hebrew => ShaperKind::Hebrew,
            UScript::Devanagari
            | UScript::Bengali
            | UScript::Gurmukhi
            | UScript::Gujarati
            | UScript::Oriya
            | UScript::Tamil
            | UScript::Telugu
            | UScript::Kannada
            | UScript::Malayalam
            | UScript::Sinhala => ShaperKind::Indic,
            UScript::Khmer => ShaperKind::Khmer,
            UScript::Myanmar => ShaperKind::Myanmar,
            UScript::Thai | UScript::Lao => ShaperKind::Thai,
            UScript::Tibetan => ShaperKind::Tibetan,
            UScript::Javanese | UScript::Balinese | UScript::Buginese | UScript::TaiLe | UScript::NewTaiLue => {
                ShaperKind::Use
            }
            _ => ShaperKind::Default,
        }
    }
}

pub fn shaper_for(kind: ShaperKind) -> &'static dyn ComplexShaper {
    match kind {
        ShaperKind::Default => &default::DefaultShaper,
        ShaperKind::Arabic => &arabic::ArabicShaper,
        ShaperKind::Hangul => &hangul::HangulShaper,
        ShaperKind::Hebrew => &hebrew::HebrewShaper,
        ShaperKind::Indic => &indic::IndicShaper,
        ShaperKind::Khmer => &khmer::KhmerShaper,
        ShaperKind::Myanmar => &myanmar::MyanmarShaper,
        ShaperKind::Thai => &thai::ThaiShaper,
        ShaperKind::Tibetan => &tibetan::TibetanShaper,
        ShaperKind::Use => &use_shaper::UseShaper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_known_scripts() {
        assert_eq!(ShaperKind::for_script(Script::of('ا')), ShaperKind::Arabic);
        assert_eq!(ShaperKind::for_script(Script::of('अ')), ShaperKind::Indic);
        assert_eq!(ShaperKind::for_script(Script::of('ก')), ShaperKind::Thai);
        assert_eq!(ShaperKind::for_script(Script::of('한')), ShaperKind::Hangul);
        assert_eq!(ShaperKind::for_script(Script::of('a')), ShaperKind::Default);
    }
}
