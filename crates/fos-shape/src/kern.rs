//! Legacy/AAT fallback (C7, spec §4.2.5, §4.3 step 6).
//!
//! The `kern` table (format 0 ordered-pair subtable) is fully parsed and
//! applied here. `morx`/`kerx`/`trak` are detected only (their state-table
//! interpreters are out of this crate's depth budget per SPEC_FULL.md);
//! the driver logs when it skips a pass a plan flagged as applicable
//! rather than silently doing nothing, per that doc's recorded scope.

use crate::buffer::Buffer;
use crate::glyph::GlyphId;
use crate::reader::Reader;

/// A parsed `kern` table format-0 ordered-pair subtable (the only format
/// every legacy consumer — including HarfBuzz's own `kern` fallback —
/// actually applies; formats 2/6 are AAT-only and out of scope here).
pub struct KernTable {
    pairs: Vec<KernPair>,
}

#[derive(Debug, Clone, Copy)]
struct KernPair {
    left: u16,
    right: u16,
    value: i16,
}

impl KernTable {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let version = reader.read_u16()?;
        if version != 0 {
            // Apple's `kern` version 1 (fixed-point, different header) is
            // not produced by the fonts this crate targets; skip rather
            // than misparse (spec §7: malformed table -> skip).
            return None;
        }
        let n_tables = reader.read_u16()?;
        let mut pairs = Vec::new();
        for _ in 0..n_tables {
            let _sub_version = reader.read_u16()?;
            let length = reader.read_u16()?;
            let coverage = reader.read_u16()?;
            let format = coverage >> 8;
            let horizontal = coverage & 0x0001 != 0;
            let has_cross_stream = coverage & 0x0004 != 0;
            if format == 0 && horizontal && !has_cross_stream {
                let n_pairs = reader.read_u16()?;
                let _search_range = reader.read_u16()?;
                let _entry_selector = reader.read_u16()?;
                let _range_shift = reader.read_u16()?;
                for _ in 0..n_pairs {
                    pairs.push(KernPair {
                        left: reader.read_u16()?,
                        right: reader.read_u16()?,
                        value: reader.read_i16()?,
                    });
                }
            } else {
                // Skip subtables we don't apply (vertical, cross-stream,
                // non-format-0) without failing the whole table.
                reader.skip(length.saturating_sub(6) as usize)?;
            }
        }
        Some(KernTable { pairs })
    }

    fn find(&self, left: GlyphId, right: GlyphId) -> Option<i16> {
        // Subtable pairs are sorted by (left,right); a linear scan is
        // correct and simple enough for the pair counts legacy `kern`
        // tables carry in practice.
        self.pairs.iter().find(|p| p.left == left.0 && p.right == right.0).map(|p| p.value)
    }
}

/// Apply legacy pairwise kerning over the whole buffer (spec §4.3 step 6:
/// "else legacy kern if `apply_kern`"). Runs after GSUB, directly on
/// adjacent glyph pairs; there is no feature mask since the legacy table
/// carries no per-glyph feature information.
pub fn apply_kern(table: &KernTable, buffer: &mut Buffer) {
    let len = buffer.len();
    if len < 2 {
        return;
    }
    for i in 0..len - 1 {
        let left = GlyphId(buffer.glyph_infos()[i].codepoint as u16);
        let right = GlyphId(buffer.glyph_infos()[i + 1].codepoint as u16);
        if let Some(value) = table.find(left, right) {
            buffer.glyph_positions_mut()[i].x_advance += value as i32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_format0(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x00, 0x01]; // version 0, 1 subtable
        let n_pairs = pairs.len() as u16;
        let sub_len = 14 + n_pairs * 6;
        data.extend_from_slice(&[0x00, 0x00]); // sub_version
        data.extend_from_slice(&sub_len.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x01]); // coverage: format 0, horizontal
        data.extend_from_slice(&n_pairs.to_be_bytes());
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // search_range/entry_selector/range_shift
        for &(l, r, v) in pairs {
            data.extend_from_slice(&l.to_be_bytes());
            data.extend_from_slice(&r.to_be_bytes());
            data.extend_from_slice(&v.to_be_bytes());
        }
        data
    }

    #[test]
    fn parses_and_applies_pair() {
        let data = build_format0(&[(5, 6, -80)]);
        let table = KernTable::parse(&data).unwrap();
        assert_eq!(table.find(GlyphId(5), GlyphId(6)), Some(-80));
        assert_eq!(table.find(GlyphId(5), GlyphId(7)), None);
    }

    #[test]
    fn apply_kern_adjusts_advance() {
        let data = build_format0(&[(5, 6, -80)]);
        let table = KernTable::parse(&data).unwrap();
        let mut buffer = Buffer::new();
        buffer.add(5, 0);
        buffer.add(6, 1);
        buffer.set_length(2);
        buffer.glyph_infos_mut()[0].codepoint = 5;
        buffer.glyph_infos_mut()[1].codepoint = 6;
        buffer.glyph_positions_mut()[0].x_advance = 500;
        apply_kern(&table, &mut buffer);
        assert_eq!(buffer.glyph_positions()[0].x_advance, 420);
    }
}
