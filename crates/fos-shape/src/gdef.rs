//! GDEF (Glyph Definition) table: glyph class, mark attachment class, and
//! mark filtering sets (spec glossary: "glyph definition table providing
//! mark/base/ligature/component classes"). Not grounded on a teacher file
//! directly — `shaping/gsub.rs`/`shaping/gpos.rs` parse GSUB/GPOS but never
//! touch GDEF — built from the same `Reader`/`ClassDef`/`Coverage`
//! conventions those files established, since the GSUB/GPOS lookup-flag
//! cursor (spec §4.4) cannot skip marks/bases/ligatures without it.

use crate::opentype::{ClassDef, Coverage};
use crate::reader::Reader;

/// The four glyph classes GDEF's `GlyphClassDef` table assigns (values are
/// the table's own encoding: 0 = unassigned).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphClass {
    Unassigned,
    Base,
    Ligature,
    Mark,
    Component,
}

impl GlyphClass {
    fn from_raw(v: u16) -> GlyphClass {
        match v {
            1 => GlyphClass::Base,
            2 => GlyphClass::Ligature,
            3 => GlyphClass::Mark,
            4 => GlyphClass::Component,
            _ => GlyphClass::Unassigned,
        }
    }
}

/// Lookup-flag bits a GSUB/GPOS lookup carries (spec §4.4: "skipping
/// glyphs whose GDEF class is filtered by the lookup's skip-mark/skip-lig/
/// skip-base flags").
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupFlag(pub u16);

impl LookupFlag {
    pub const RIGHT_TO_LEFT: u16 = 0x0001;
    pub const IGNORE_BASE_GLYPHS: u16 = 0x0002;
    pub const IGNORE_LIGATURES: u16 = 0x0004;
    pub const IGNORE_MARKS: u16 = 0x0008;
    pub const USE_MARK_FILTERING_SET: u16 = 0x0010;
    pub const MARK_ATTACHMENT_TYPE_MASK: u16 = 0xFF00;

    pub fn right_to_left(self) -> bool {
        self.0 & Self::RIGHT_TO_LEFT != 0
    }
    pub fn ignore_base_glyphs(self) -> bool {
        self.0 & Self::IGNORE_BASE_GLYPHS != 0
    }
    pub fn ignore_ligatures(self) -> bool {
        self.0 & Self::IGNORE_LIGATURES != 0
    }
    pub fn ignore_marks(self) -> bool {
        self.0 & Self::IGNORE_MARKS != 0
    }
    pub fn uses_mark_filtering_set(self) -> bool {
        self.0 & Self::USE_MARK_FILTERING_SET != 0
    }
    pub fn mark_attachment_type(self) -> u8 {
        ((self.0 & Self::MARK_ATTACHMENT_TYPE_MASK) >> 8) as u8
    }
}

pub struct GdefTable {
    glyph_class_def: Option<ClassDef>,
    mark_attach_class_def: Option<ClassDef>,
    mark_glyph_sets: Vec<Coverage>,
}

impl GdefTable {
    /// A table with no glyph classification at all — the fallback when a
    /// font carries no GDEF, so the lookup-flag cursor still has
    /// something to call `should_skip` on (spec §4.4).
    pub fn empty() -> Self {
        GdefTable { glyph_class_def: None, mark_attach_class_def: None, mark_glyph_sets: Vec::new() }
    }

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let major = reader.read_u16()?;
        let minor = reader.read_u16()?;
        if major != 1 {
            return None;
        }

        let glyph_class_def_offset = reader.read_u16()?;
        let _attach_list_offset = reader.read_u16()?;
        let _lig_caret_list_offset = reader.read_u16()?;
        let mark_attach_class_def_offset = reader.read_u16()?;

        let mark_glyph_sets_offset = if minor >= 2 { reader.read_u16()? } else { 0 };

        let glyph_class_def = if glyph_class_def_offset != 0 {
            ClassDef::parse(reader.at_offset(glyph_class_def_offset as usize))
        } else {
            None
        };
        let mark_attach_class_def = if mark_attach_class_def_offset != 0 {
            ClassDef::parse(reader.at_offset(mark_attach_class_def_offset as usize))
        } else {
            None
        };

        let mark_glyph_sets = if mark_glyph_sets_offset != 0 {
            parse_mark_glyph_sets(reader.at_offset(mark_glyph_sets_offset as usize)).unwrap_or_default()
        } else {
            Vec::new()
        };

        Some(GdefTable { glyph_class_def, mark_attach_class_def, mark_glyph_sets })
    }

    pub fn glyph_class(&self, glyph: u16) -> GlyphClass {
        self.glyph_class_def
            .as_ref()
            .map(|cd| GlyphClass::from_raw(cd.get(glyph)))
            .unwrap_or(GlyphClass::Unassigned)
    }

    pub fn mark_attach_class(&self, glyph: u16) -> u16 {
        self.mark_attach_class_def.as_ref().map(|cd| cd.get(glyph)).unwrap_or(0)
    }

    /// Does this table actually classify any glyph as a mark? A plan uses
    /// this to decide whether it can trust GDEF's classes or needs the
    /// fallback heuristic (spec §4.2 step 5, `FALLBACK_GLYPH_CLASSES`).
    pub fn has_mark_classification(&self) -> bool {
        self.glyph_class_def.is_some()
    }

    pub fn mark_filtering_set_contains(&self, set_index: u16, glyph: u16) -> bool {
        self.mark_glyph_sets
            .get(set_index as usize)
            .map(|cov| cov.contains(glyph))
            .unwrap_or(true)
    }

    /// Should the cursor skip this glyph for a lookup with the given flags
    /// (spec §4.4)?
    pub fn should_skip(&self, glyph: u16, flag: LookupFlag) -> bool {
        let class = self.glyph_class(glyph);
        if flag.ignore_base_glyphs() && class == GlyphClass::Base {
            return true;
        }
        if flag.ignore_ligatures() && class == GlyphClass::Ligature {
            return true;
        }
        if flag.ignore_marks() && class == GlyphClass::Mark {
            return true;
        }
        if class == GlyphClass::Mark {
            if flag.uses_mark_filtering_set() {
                // mark_filtering_set is resolved by the caller (GsubLookup/
                // GposLookup carry it separately, per spec's own Plan
                // field); absent a set index here we don't filter.
                return false;
            }
            let wanted = flag.mark_attachment_type();
            if wanted != 0 && self.mark_attach_class(glyph) != wanted as u16 {
                return true;
            }
        }
        false
    }
}

fn parse_mark_glyph_sets(data: &[u8]) -> Option<Vec<Coverage>> {
    let mut reader = Reader::new(data);
    let _format = reader.read_u16()?;
    let count = reader.read_u16()?;
    let mut offsets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        offsets.push(reader.read_u32()?);
    }
    let mut sets = Vec::with_capacity(count as usize);
    for offset in offsets {
        sets.push(Coverage::parse(reader.at_offset(offset as usize))?);
    }
    Some(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_flag_bits() {
        let f = LookupFlag(LookupFlag::IGNORE_MARKS | LookupFlag::RIGHT_TO_LEFT);
        assert!(f.ignore_marks());
        assert!(f.right_to_left());
        assert!(!f.ignore_base_glyphs());
    }

    #[test]
    fn mark_attachment_type_bits() {
        let f = LookupFlag(0x0300); // class 3 in high byte
        assert_eq!(f.mark_attachment_type(), 3);
    }
}
