//! Khmer (spec §4.5 Khmer family). Khmer syllables follow the same
//! `(C Coeng)* C (Robat)? (Matra)* (Modifier)*` shape as the Indic family's
//! `(C Nukta? Halant)* C` structure in
//! `engine/fos-text/src/shaping/indic.rs`, with Khmer's own combining
//! Coeng sign (U+17D2) standing in for Indic's virama/halant; grounded on
//! that file's `segment_syllables` control flow, re-specialized to
//! Khmer's Unicode block (U+1780-17FF) instead of adding a new
//! `*_category` branch for it.

use super::ComplexShaper;
use crate::buffer::Buffer;
use crate::plan::PlanBuilder;

const COENG: u32 = 0x17D2;

fn is_consonant(c: char) -> bool {
    matches!(c as u32, 0x1780..=0x17A2)
}

fn is_dependent_vowel(c: char) -> bool {
    matches!(c as u32, 0x17B6..=0x17C5)
}

fn is_modifier(c: char) -> bool {
    matches!(c as u32, 0x17C6..=0x17D1 | 0x17DD)
}

struct Syllable {
    start: usize,
    end: usize,
}

/// Segment `(C (Coeng C)*)? (Vowel)* (Modifier)*` runs.
fn segment_syllables(cps: &[u32]) -> Vec<Syllable> {
    let len = cps.len();
    let mut out = Vec::new();
    let mut i = 0;
    while i < len {
        let start = i;
        let c = char::from_u32(cps[i]).unwrap_or('\0');
        if !is_consonant(c) {
            i += 1;
            continue;
        }
        i += 1;
        while i + 1 < len && cps[i] == COENG && is_consonant(char::from_u32(cps[i + 1]).unwrap_or('\0')) {
            i += 2;
        }
        while i < len && is_dependent_vowel(char::from_u32(cps[i]).unwrap_or('\0')) {
            i += 1;
        }
        while i < len && is_modifier(char::from_u32(cps[i]).unwrap_or('\0')) {
            i += 1;
        }
        out.push(Syllable { start, end: i });
    }
    out
}

pub struct KhmerShaper;

impl ComplexShaper for KhmerShaper {
    fn collect_features(&self, builder: &mut PlanBuilder) {
        for tag in [*b"pref", *b"blwf", *b"abvf", *b"pstf", *b"clig"] {
            builder.add_gsub(tag, 1);
        }
    }

    fn preprocess_text(&self, buffer: &mut Buffer) {
        let cps: Vec<u32> = buffer.glyph_infos().iter().map(|g| g.codepoint).collect();
        for syl in segment_syllables(&cps) {
            buffer.merge_clusters(syl.start, syl.end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_consonant_stack_with_coeng() {
        let cps: Vec<u32> = vec![0x1780, COENG, 0x1780];
        let syllables = segment_syllables(&cps);
        assert_eq!(syllables.len(), 1);
        assert_eq!(syllables[0].start, 0);
        assert_eq!(syllables[0].end, 3);
    }

    #[test]
    fn merges_syllable_clusters() {
        let mut buffer = Buffer::new();
        buffer.add(0x1780, 0);
        buffer.add(COENG, 1);
        buffer.add(0x1780, 2);
        buffer.set_length(3);
        KhmerShaper.preprocess_text(&mut buffer);
        let clusters: Vec<u32> = buffer.glyph_infos().iter().map(|g| g.cluster).collect();
        assert_eq!(clusters, vec![0, 0, 0]);
    }
}
