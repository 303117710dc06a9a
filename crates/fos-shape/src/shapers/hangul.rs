//! Hangul algorithmic decomposition (spec §4.5 Hangul family).
//!
//! Precomposed Hangul syllables (U+AC00-D7A3) decompose into Leading
//! consonant (L), Vowel (V), and optional Trailing consonant (T) jamo by
//! the closed-form arithmetic in Unicode §3.12, rather than a lookup
//! table. Not grounded on any teacher shaper file (the teacher's shaping
//! module has no Hangul handling); grounded directly on the Unicode
//! Standard algorithm every production Hangul shaper implements
//! identically, following this crate's own decompose/compose convention
//! in [`crate::normalize`].

use super::ComplexShaper;
use crate::buffer::Buffer;

const S_BASE: u32 = 0xAC00;
const L_BASE: u32 = 0x1100;
const V_BASE: u32 = 0x1161;
const T_BASE: u32 = 0x11A7;
const L_COUNT: u32 = 19;
const V_COUNT: u32 = 21;
const T_COUNT: u32 = 28;
const N_COUNT: u32 = V_COUNT * T_COUNT;
const S_COUNT: u32 = L_COUNT * N_COUNT;

/// Decompose one precomposed syllable into (L, V, Some(T)) jamo.
fn decompose_syllable(s: u32) -> Option<(u32, u32, Option<u32>)> {
    if s < S_BASE || s >= S_BASE + S_COUNT {
        return None;
    }
    let s_index = s - S_BASE;
    let l = L_BASE + s_index / N_COUNT;
    let v = V_BASE + (s_index % N_COUNT) / T_COUNT;
    let t_index = s_index % T_COUNT;
    let t = if t_index == 0 { None } else { Some(T_BASE + t_index) };
    Some((l, v, t))
}

pub struct HangulShaper;

impl ComplexShaper for HangulShaper {
    fn preprocess_text(&self, buffer: &mut Buffer) {
        buffer.set_idx(0);
        loop {
            if buffer.idx() >= buffer.len() {
                break;
            }
            let cp = buffer.glyph_infos()[buffer.idx()].codepoint;
            match decompose_syllable(cp) {
                Some((l, v, Some(t))) => buffer.replace_glyphs(1, &[l, v, t]),
                Some((l, v, None)) => buffer.replace_glyphs(1, &[l, v]),
                None => buffer.next_glyph(),
            }
        }
        buffer.swap_buffers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_syllable_with_trailing_consonant() {
        // U+AC01 = 각 (GA + trailing consonant G)
        let (l, v, t) = decompose_syllable(0xAC01).unwrap();
        assert_eq!(l, L_BASE);
        assert_eq!(v, V_BASE);
        assert_eq!(t, Some(T_BASE + 1));
    }

    #[test]
    fn decomposes_syllable_without_trailing_consonant() {
        // U+AC00 = 가 (GA)
        let (l, v, t) = decompose_syllable(0xAC00).unwrap();
        assert_eq!(l, L_BASE);
        assert_eq!(v, V_BASE);
        assert_eq!(t, None);
    }

    #[test]
    fn non_hangul_codepoint_returns_none() {
        assert_eq!(decompose_syllable('a' as u32), None);
    }

    #[test]
    fn preprocess_expands_buffer() {
        let mut buffer = Buffer::new();
        buffer.add(0xAC01, 0); // 각
        HangulShaper.preprocess_text(&mut buffer);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.glyph_infos()[0].codepoint, L_BASE);
        assert_eq!(buffer.glyph_infos()[1].codepoint, V_BASE);
        assert_eq!(buffer.glyph_infos()[2].codepoint, T_BASE + 1);
        assert!(buffer.glyph_infos().iter().all(|g| g.cluster == 0));
    }
}
