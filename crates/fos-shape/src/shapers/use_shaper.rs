//! Universal shaping engine fallback (spec §4.5 USE), for complex scripts
//! with no dedicated shaper above — Javanese, Balinese, Buginese, Tai Le,
//! New Tai Lue. These all share the Brahmic base-plus-combining-marks
//! structure the Indic family formalizes, but without the per-script
//! Unicode block tables [`super::indic`] needs; rather than guess at
//! block ranges with no grounding file to check them against, this
//! groups any maximal run of combining marks (general category Mn/Mc)
//! onto the preceding base into one cluster, using the same
//! [`crate::unicode::is_mark`] the normalizer calls to do its own
//! combining-class reordering — the conservative, widely-correct subset
//! of what a real USE grapheme-cluster table would do.

use super::ComplexShaper;
use crate::buffer::Buffer;
use crate::unicode::is_mark;

pub struct UseShaper;

impl ComplexShaper for UseShaper {
    fn preprocess_text(&self, buffer: &mut Buffer) {
        let len = buffer.len();
        let mut i = 0;
        while i < len {
            let is_base = char::from_u32(buffer.glyph_infos()[i].codepoint).map(|c| !is_mark(c)).unwrap_or(true);
            if !is_base {
                i += 1;
                continue;
            }
            let start = i;
            i += 1;
            while i < len && char::from_u32(buffer.glyph_infos()[i].codepoint).map(is_mark).unwrap_or(false) {
                i += 1;
            }
            if i - start > 1 {
                buffer.merge_clusters(start, i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_base_and_trailing_marks_into_one_cluster() {
        let mut buffer = Buffer::new();
        buffer.add('a' as u32, 0);
        buffer.add('\u{0301}' as u32, 1);
        buffer.set_length(2);
        UseShaper.preprocess_text(&mut buffer);
        assert_eq!(buffer.glyph_infos()[0].cluster, 0);
        assert_eq!(buffer.glyph_infos()[1].cluster, 0);
    }
}
