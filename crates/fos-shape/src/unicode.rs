//! Unicode adapter (C1).
//!
//! Supplies the handful of per-codepoint properties the rest of the core
//! needs: general category, script, canonical combining class, mirroring,
//! and canonical decomposition/composition. Everything here is a thin,
//! allocation-free wrapper over `unicode-properties`, `unicode-script` and
//! `unicode-normalization` — see SPEC_FULL.md's Ambient stack section for
//! why those crates (already used elsewhere in the retrieval pack, by
//! `servo-servo/components/fonts` and `raphamorim-rio/rio-lib`
//! respectively) replace the teacher's hand-rolled ASCII-range sketch in
//! the orphaned `shaping/bidi.rs`.

use unicode_normalization::char::{canonical_combining_class, compose as uax_compose, decompose_canonical};
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};
use unicode_script::{Script as UScript, UnicodeScript};

/// A script tag, compared the way `SegmentProperties` compares scripts:
/// by the underlying ISO 15924-identified Unicode script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Script(pub UScript);

impl Script {
    pub const UNKNOWN: Script = Script(UScript::Unknown);
    pub const COMMON: Script = Script(UScript::Common);
    pub const INHERITED: Script = Script(UScript::Inherited);

    pub fn of(c: char) -> Script {
        Script(c.script())
    }

    pub fn is_real(self) -> bool {
        !matches!(self.0, UScript::Unknown | UScript::Common | UScript::Inherited)
    }

    /// The horizontal direction a run of this script defaults to when the
    /// caller leaves `Direction::Invalid` for `guess_segment_properties`
    /// to resolve (RTL scripts per Unicode's Scripts.txt right-to-left
    /// set; everything else defaults LTR).
    pub fn horizontal_direction(self) -> crate::segment::Direction {
        use crate::segment::Direction;
        match self.0 {
            UScript::Arabic
            | UScript::Hebrew
            | UScript::Syriac
            | UScript::Thaana
            | UScript::Nko
            | UScript::Samaritan
            | UScript::Mandaic
            | UScript::Adlam => Direction::RightToLeft,
            _ => Direction::LeftToRight,
        }
    }

    /// The 4-byte OpenType script tag a GSUB/GPOS `ScriptList` indexes by
    /// (spec §4.2 step 2: "derived from the font's GSUB feature/lookup
    /// tables"). Falls back to `DFLT` for scripts with no dedicated OT tag
    /// or not covered by this table; `ScriptList::default_script` is the
    /// font-side fallback for that case.
    pub fn ot_tag(self) -> [u8; 4] {
        match self.0 {
            UScript::Latin => *b"latn",
            UScript::Greek => *b"grek",
            UScript::Cyrillic => *b"cyrl",
            UScript::Armenian => *b"armn",
            UScript::Hebrew => *b"hebr",
            UScript::Arabic => *b"arab",
            UScript::Syriac => *b"syrc",
            UScript::Thaana => *b"thaa",
            UScript::Devanagari => *b"deva",
            UScript::Bengali => *b"beng",
            UScript::Gurmukhi => *b"guru",
            UScript::Gujarati => *b"gujr",
            UScript::Oriya => *b"orya",
            UScript::Tamil => *b"taml",
            UScript::Telugu => *b"telu",
            UScript::Kannada => *b"knda",
            UScript::Malayalam => *b"mlym",
            UScript::Sinhala => *b"sinh",
            UScript::Thai => *b"thai",
            UScript::Lao => *b"lao ",
            UScript::Tibetan => *b"tibt",
            UScript::Myanmar => *b"mymr",
            UScript::Georgian => *b"geor",
            UScript::Hangul => *b"hang",
            UScript::Ethiopic => *b"ethi",
            UScript::Cherokee => *b"cher",
            UScript::Khmer => *b"khmr",
            UScript::Mongolian => *b"mong",
            UScript::Hiragana | UScript::Katakana => *b"kana",
            UScript::Han => *b"hani",
            UScript::Bopomofo => *b"bopo",
            UScript::Yi => *b"yi  ",
            UScript::Tagalog => *b"tglg",
            UScript::Buginese => *b"bugi",
            UScript::NewTaiLue => *b"talu",
            UScript::TaiLe => *b"tale",
            UScript::Balinese => *b"bali",
            UScript::Javanese => *b"java",
            UScript::Adlam => *b"adlm",
            UScript::Nko => *b"nko ",
            UScript::Samaritan => *b"samr",
            UScript::Mandaic => *b"mand",
            _ => *b"DFLT",
        }
    }

    pub fn name(self) -> &'static str {
        // unicode-script's Debug impl is the script's canonical name; a
        // short_name() accessor isn't part of its public API.
        match self.0 {
            UScript::Arabic => "Arabic",
            UScript::Hebrew => "Hebrew",
            UScript::Devanagari => "Devanagari",
            UScript::Bengali => "Bengali",
            UScript::Khmer => "Khmer",
            UScript::Myanmar => "Myanmar",
            UScript::Thai => "Thai",
            UScript::Tibetan => "Tibetan",
            UScript::Hangul => "Hangul",
            UScript::Han => "Han",
            UScript::Hiragana => "Hiragana",
            UScript::Katakana => "Katakana",
            UScript::Latin => "Latin",
            UScript::Cyrillic => "Cyrillic",
            UScript::Greek => "Greek",
            _ => "Unknown",
        }
    }
}

/// General category, grouped the way shaping logic actually branches on
/// it (mark vs. not, rather than the full 30-way Unicode partition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryGroup {
    Letter,
    Mark,
    Number,
    Punctuation,
    Symbol,
    Separator,
    Other,
}

pub fn general_category(c: char) -> GeneralCategory {
    c.general_category()
}

pub fn category_group(c: char) -> CategoryGroup {
    use GeneralCategory::*;
    match general_category(c) {
        UppercaseLetter | LowercaseLetter | TitlecaseLetter | ModifierLetter | OtherLetter => {
            CategoryGroup::Letter
        }
        NonspacingMark | SpacingMark | EnclosingMark => CategoryGroup::Mark,
        DecimalNumber | LetterNumber | OtherNumber => CategoryGroup::Number,
        ConnectorPunctuation | DashPunctuation | OpenPunctuation | ClosePunctuation
        | InitialPunctuation | FinalPunctuation | OtherPunctuation => CategoryGroup::Punctuation,
        MathSymbol | CurrencySymbol | ModifierSymbol | OtherSymbol => CategoryGroup::Symbol,
        SpaceSeparator | LineSeparator | ParagraphSeparator => CategoryGroup::Separator,
        _ => CategoryGroup::Other,
    }
}

/// Is `c` a combining mark (the property GSUB/GPOS mark lookups key on)?
pub fn is_mark(c: char) -> bool {
    category_group(c) == CategoryGroup::Mark
}

/// Unicode canonical combining class, used to stable-sort marks into
/// canonical order during normalization (spec §4.3 step 2).
pub fn combining_class(c: char) -> u8 {
    canonical_combining_class(c).into()
}

/// Canonical decomposition of a single precomposed codepoint into exactly
/// two codepoints, the form the normalizer needs (spec §6: "canonical
/// decompose(cp) -> (a,b)?"). Singleton and compatibility decompositions
/// are not surfaced here: spec's normalizer operates on canonical
/// 2-element decomposition only.
pub fn decompose_pair(c: char) -> Option<(char, char)> {
    let mut out = None;
    let mut count = 0;
    decompose_canonical(c, |d| {
        count += 1;
        out = match out {
            None => Some((d, '\0')),
            Some((a, _)) => Some((a, d)),
        };
    });
    if count == 2 { out } else { None }
}

/// Canonical composition of two codepoints, the inverse of
/// [`decompose_pair`].
pub fn compose_pair(a: char, b: char) -> Option<char> {
    uax_compose(a, b)
}

/// Default-ignorable codepoints (ZWJ/ZWNJ, variation selectors, format
/// controls, etc.) — hidden from the final glyph run unless the caller
/// asks to preserve them (spec §4.3 step 7, `PRESERVE_DEFAULT_IGNORABLES`).
///
/// This mirrors the approach every production shaper in the corpus takes
/// (a short hand-curated range table) rather than pulling in a crate for
/// a single derived property.
pub fn is_default_ignorable(c: char) -> bool {
    matches!(c as u32,
        0x00AD |                     // soft hyphen
        0x034F |                     // combining grapheme joiner
        0x061C |                     // Arabic letter mark
        0x115F..=0x1160 |            // Hangul filler
        0x17B4..=0x17B5 |            // Khmer inherent vowels (invisible)
        0x180B..=0x180F |            // Mongolian variation selectors / FVS
        0x200B..=0x200F |            // ZWSP, ZWNJ, ZWJ, LRM, RLM
        0x202A..=0x202E |            // directional embeddings/overrides
        0x2060..=0x206F |            // word joiner, invisible operators, deprecated controls
        0x3164 |                     // Hangul filler
        0xFE00..=0xFE0F |            // variation selectors 1-16
        0xFEFF |                     // zero width no-break space / BOM
        0xFFA0 |                     // halfwidth Hangul filler
        0xFFF0..=0xFFF8 |            // unassigned specials
        0x1BCA0..=0x1BCA3 |          // shorthand format controls
        0x1D173..=0x1D17A |          // musical symbol format controls
        0xE0000..=0xE0FFF            // tag characters, variation selectors supplement
    )
}

/// Mirrored-pair glyph for RTL mirroring (`rtlm` resolution, spec §4.2.6),
/// covering the Bidi_Paired_Bracket repertoire plus common quote marks.
/// Kept as a small hand-curated table in the teacher's own style (see
/// `mirror_char` in the now-removed `shaping/bidi.rs`) rather than adding
/// a dependency for one narrow property.
pub fn mirror(c: char) -> Option<char> {
    let m = match c {
        '(' => ')', ')' => '(',
        '[' => ']', ']' => '[',
        '{' => '}', '}' => '{',
        '<' => '>', '>' => '<',
        '«' => '»', '»' => '«',
        '‹' => '›', '›' => '‹',
        '⁅' => '⁆', '⁆' => '⁅',
        '⌈' => '⌉', '⌉' => '⌈',
        '⌊' => '⌋', '⌋' => '⌊',
        '〈' => '〉', '〉' => '〈',
        '⟨' => '⟩', '⟩' => '⟨',
        '⟪' => '⟫', '⟫' => '⟪',
        '⟬' => '⟭', '⟭' => '⟬',
        '⟮' => '⟯', '⟯' => '⟮',
        '﹤' => '﹥', '﹥' => '﹤',
        _ => return None,
    };
    Some(m)
}

pub fn is_mirrored(c: char) -> bool {
    mirror(c).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts() {
        assert_eq!(Script::of('a'), Script(UScript::Latin));
        assert_eq!(Script::of('ا'), Script(UScript::Arabic));
        assert_eq!(Script::of('\u{0301}'), Script(UScript::Inherited));
    }

    #[test]
    fn marks() {
        assert!(is_mark('\u{0301}')); // combining acute accent
        assert!(!is_mark('a'));
    }

    #[test]
    fn decompose_precomposed_e_acute() {
        let (base, mark) = decompose_pair('\u{00E9}').unwrap(); // é
        assert_eq!(base, 'e');
        assert_eq!(mark, '\u{0301}');
        assert_eq!(compose_pair(base, mark), Some('\u{00E9}'));
    }

    #[test]
    fn default_ignorables() {
        assert!(is_default_ignorable('\u{200B}'));
        assert!(!is_default_ignorable('a'));
    }

    #[test]
    fn mirroring() {
        assert_eq!(mirror('('), Some(')'));
        assert_eq!(mirror('A'), None);
    }
}
