//! Arabic joining and positional-form shaping (spec §4.5 Arabic family:
//! Arabic, Syriac, N'Ko, Mandaic, Adlam). Ported from the joining-type
//! table and state machine in
//! `engine/fos-text/src/shaping/arabic.rs`, adapted to operate on a
//! [`Buffer`] in place of that file's standalone `&str` analysis, and to
//! assign OpenType feature masks instead of indexing a presentation-form
//! lookup table (GSUB substitution — not presentation-form remapping —
//! does the actual glyph selection here; see module docs on
//! `get_presentation_form` below for why that table isn't used directly).

use super::{ComplexShaper, ZeroMarksPolicy};
use crate::buffer::Buffer;
use crate::normalize::NormalizationPreference;
use crate::plan::{FeatureMap, PlanBuilder};

/// Arabic joining type (Unicode `ArabicShaping.txt`, condensed to the
/// classes the state machine actually branches on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoiningType {
    Right,
    Left,
    Dual,
    Causing,
    NonJoining,
    Transparent,
}

fn joining_type(c: char) -> JoiningType {
    let code = c as u32;
    match code {
        0x0622 | 0x0623 | 0x0624 | 0x0625 | 0x0627 | 0x0629 | 0x062F | 0x0630 | 0x0631 | 0x0632
        | 0x0648 | 0x0671..=0x0673 | 0x0675..=0x0677 | 0x0688..=0x0699 | 0x06C0 | 0x06C3
        | 0x06C4..=0x06CB | 0x06CD | 0x06CF | 0x06D2 | 0x06D3 | 0x06D5 | 0x06EE..=0x06EF => {
            JoiningType::Right
        }
        0x0626 | 0x0628 | 0x062A..=0x062E | 0x0633..=0x063F | 0x0641..=0x0647 | 0x0649..=0x064A
        | 0x066E..=0x066F | 0x0678..=0x0687 | 0x069A..=0x06BF | 0x06C1..=0x06C2 | 0x06CC
        | 0x06CE | 0x06D0..=0x06D1 | 0x06FA..=0x06FC | 0x06FF | 0x0750..=0x077F
        | 0x08A0..=0x08B4 | 0x08B6..=0x08C7 => JoiningType::Dual,
        0x064B..=0x065F | 0x0670 | 0x06D6..=0x06DC | 0x06DF..=0x06E4 | 0x06E7..=0x06E8
        | 0x06EA..=0x06ED | 0x08D3..=0x08E1 | 0x08E3..=0x08FF | 0xFE00..=0xFE0F => {
            JoiningType::Transparent
        }
        0x200D => JoiningType::Causing,
        0x200C => JoiningType::NonJoining,
        0x0710 | 0x0712..=0x072F | 0x074D..=0x074F => JoiningType::Dual,
        0x0711 => JoiningType::Right,
        0x0730..=0x074A => JoiningType::Transparent,
        0x07CA..=0x07EA => JoiningType::Dual,
        0x07EB..=0x07F3 | 0x07FD => JoiningType::Transparent,
        0x0840..=0x0858 => JoiningType::Dual,
        0x0859..=0x085B => JoiningType::Transparent,
        _ => JoiningType::NonJoining,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionalForm {
    Isolated,
    Initial,
    Medial,
    Final,
}

impl PositionalForm {
    fn feature_tag(self) -> [u8; 4] {
        match self {
            PositionalForm::Isolated => *b"isol",
            PositionalForm::Initial => *b"init",
            PositionalForm::Medial => *b"medi",
            PositionalForm::Final => *b"fina",
        }
    }
}

/// Resolve positional forms for a run of joining types in logical order
/// (the same algorithm as the teacher's `ArabicShaper::analyze`, reworked
/// to avoid a separate owned buffer of `char`s — it reads straight off
/// `joining_types`).
fn resolve_forms(joining_types: &[JoiningType]) -> Vec<PositionalForm> {
    let len = joining_types.len();
    let mut forms = vec![PositionalForm::Isolated; len];
    for i in 0..len {
        let jt = joining_types[i];
        if jt == JoiningType::Transparent || jt == JoiningType::NonJoining {
            continue;
        }
        let can_join_prev = can_join_previous(joining_types, i);
        let can_join_next = can_join_next(joining_types, i);
        forms[i] = match jt {
            JoiningType::Right => {
                if can_join_next { PositionalForm::Initial } else { PositionalForm::Isolated }
            }
            JoiningType::Left => {
                if can_join_prev { PositionalForm::Final } else { PositionalForm::Isolated }
            }
            JoiningType::Dual => match (can_join_prev, can_join_next) {
                (true, true) => PositionalForm::Medial,
                (true, false) => PositionalForm::Final,
                (false, true) => PositionalForm::Initial,
                (false, false) => PositionalForm::Isolated,
            },
            _ => PositionalForm::Isolated,
        };
    }
    forms
}

fn can_join_previous(joining_types: &[JoiningType], pos: usize) -> bool {
    if pos == 0 {
        return false;
    }
    for i in (0..pos).rev() {
        match joining_types[i] {
            JoiningType::Transparent => continue,
            JoiningType::Dual | JoiningType::Left | JoiningType::Causing => return true,
            _ => return false,
        }
    }
    false
}

fn can_join_next(joining_types: &[JoiningType], pos: usize) -> bool {
    if pos + 1 >= joining_types.len() {
        return false;
    }
    for jt in &joining_types[pos + 1..] {
        match jt {
            JoiningType::Transparent => continue,
            JoiningType::Dual | JoiningType::Right | JoiningType::Causing => return true,
            _ => return false,
        }
    }
    false
}

pub struct ArabicShaper;

impl ComplexShaper for ArabicShaper {
    fn collect_features(&self, builder: &mut PlanBuilder) {
        for tag in [*b"isol", *b"fina", *b"medi", *b"init", *b"rclt", *b"dlig", *b"cswh", *b"mset"] {
            builder.add_gsub(tag, 1);
        }
        builder.add_gpos(*b"curs", 1);
    }

    fn override_features(&self, builder: &mut PlanBuilder) {
        // Generic ligation must not run ahead of the positional-form
        // substitutions or it can consume a glyph before `fina`/`init`
        // get a chance at it; the dedicated `rlig` (already a default)
        // covers Arabic's required ligatures instead.
        builder.disable_gsub(*b"liga");
        builder.disable_gsub(*b"clig");
    }

    fn normalization_preference(&self) -> NormalizationPreference {
        NormalizationPreference::ComposedDiacriticsNoShortCircuit
    }

    fn setup_masks(&self, buffer: &mut Buffer, gsub_map: &FeatureMap) {
        let len = buffer.len();
        let joining_types: Vec<JoiningType> = buffer
            .glyph_infos()
            .iter()
            .map(|info| char::from_u32(info.codepoint).map(joining_type).unwrap_or(JoiningType::NonJoining))
            .collect();
        let forms = resolve_forms(&joining_types);
        for i in 0..len {
            if joining_types[i] == JoiningType::Transparent || joining_types[i] == JoiningType::NonJoining {
                continue;
            }
            if let Some(mask) = gsub_map.mask_for(forms[i].feature_tag()) {
                buffer.glyph_infos_mut()[i].mask |= mask;
            }
        }
    }

    fn zero_width_marks(&self) -> ZeroMarksPolicy {
        ZeroMarksPolicy::After
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joining_type_alef_is_right() {
        assert_eq!(joining_type('\u{0627}'), JoiningType::Right);
    }

    #[test]
    fn joining_type_beh_is_dual() {
        assert_eq!(joining_type('\u{0628}'), JoiningType::Dual);
    }

    #[test]
    fn joining_type_fatha_is_transparent() {
        assert_eq!(joining_type('\u{064E}'), JoiningType::Transparent);
    }

    #[test]
    fn isolated_single_letter() {
        let jt = vec![joining_type('\u{0627}')];
        assert_eq!(resolve_forms(&jt), vec![PositionalForm::Isolated]);
    }

    #[test]
    fn beh_seen_meem_resolves_initial_medial_final() {
        // "بسم" - beh, seen, meem
        let jt: Vec<JoiningType> = "بسم".chars().map(joining_type).collect();
        let forms = resolve_forms(&jt);
        assert_eq!(forms, vec![PositionalForm::Initial, PositionalForm::Medial, PositionalForm::Final]);
    }

    #[test]
    fn setup_masks_sets_feature_bit_for_form() {
        let mut buffer = Buffer::new();
        for c in "بسم".chars() {
            buffer.add(c as u32, 0);
        }
        buffer.set_length(3);
        let mut map = FeatureMap::default();
        map.entries.push(crate::plan::LookupEntry { tag: *b"init", mask: 1 << 1, lookup_indices: vec![] });
        map.entries.push(crate::plan::LookupEntry { tag: *b"medi", mask: 1 << 2, lookup_indices: vec![] });
        map.entries.push(crate::plan::LookupEntry { tag: *b"fina", mask: 1 << 3, lookup_indices: vec![] });
        ArabicShaper.setup_masks(&mut buffer, &map);
        assert_eq!(buffer.glyph_infos()[0].mask & (1 << 1), 1 << 1);
        assert_eq!(buffer.glyph_infos()[1].mask & (1 << 2), 1 << 2);
        assert_eq!(buffer.glyph_infos()[2].mask & (1 << 3), 1 << 3);
    }
}
