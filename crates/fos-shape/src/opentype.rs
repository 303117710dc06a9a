//! Shared OpenType layout infrastructure: Coverage and ClassDef tables,
//! used by both GSUB and GPOS (spec §4.4). Ported from the teacher's
//! `shaping/gsub.rs` (`Coverage`/`ClassDef`, originally private to that
//! file) onto [`crate::reader::Reader`] and promoted to a shared module
//! since GPOS needs the identical tables.

use crate::reader::Reader;

#[derive(Debug)]
pub struct Coverage {
    data: CoverageData,
}

#[derive(Debug)]
enum CoverageData {
    GlyphArray(Vec<u16>),
    RangeArray(Vec<RangeRecord>),
}

#[derive(Debug, Clone, Copy)]
struct RangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    start_coverage_index: u16,
}

impl Coverage {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;

        let coverage_data = match format {
            1 => {
                let count = reader.read_u16()?;
                let mut glyphs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    glyphs.push(reader.read_u16()?);
                }
                CoverageData::GlyphArray(glyphs)
            }
            2 => {
                let count = reader.read_u16()?;
                let mut ranges = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    ranges.push(RangeRecord {
                        start_glyph: reader.read_u16()?,
                        end_glyph: reader.read_u16()?,
                        start_coverage_index: reader.read_u16()?,
                    });
                }
                CoverageData::RangeArray(ranges)
            }
            _ => return None,
        };

        Some(Self { data: coverage_data })
    }

    pub fn get(&self, glyph_id: u16) -> Option<u16> {
        match &self.data {
            CoverageData::GlyphArray(glyphs) => glyphs.binary_search(&glyph_id).ok().map(|i| i as u16),
            CoverageData::RangeArray(ranges) => {
                for range in ranges {
                    if glyph_id >= range.start_glyph && glyph_id <= range.end_glyph {
                        return Some(range.start_coverage_index + (glyph_id - range.start_glyph));
                    }
                }
                None
            }
        }
    }

    pub fn contains(&self, glyph_id: u16) -> bool {
        self.get(glyph_id).is_some()
    }
}

#[derive(Debug)]
pub struct ClassDef {
    data: ClassDefData,
}

#[derive(Debug)]
enum ClassDefData {
    Format1 { start_glyph: u16, class_values: Vec<u16> },
    Format2(Vec<ClassRangeRecord>),
}

#[derive(Debug, Clone, Copy)]
struct ClassRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    class: u16,
}

impl ClassDef {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;

        let class_data = match format {
            1 => {
                let start_glyph = reader.read_u16()?;
                let count = reader.read_u16()?;
                let mut class_values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    class_values.push(reader.read_u16()?);
                }
                ClassDefData::Format1 { start_glyph, class_values }
            }
            2 => {
                let count = reader.read_u16()?;
                let mut ranges = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    ranges.push(ClassRangeRecord {
                        start_glyph: reader.read_u16()?,
                        end_glyph: reader.read_u16()?,
                        class: reader.read_u16()?,
                    });
                }
                ClassDefData::Format2(ranges)
            }
            _ => return None,
        };

        Some(Self { data: class_data })
    }

    /// Class for a glyph; 0 (the unassigned class) if not covered.
    pub fn get(&self, glyph_id: u16) -> u16 {
        match &self.data {
            ClassDefData::Format1 { start_glyph, class_values } => {
                if glyph_id < *start_glyph {
                    return 0;
                }
                let idx = (glyph_id - start_glyph) as usize;
                class_values.get(idx).copied().unwrap_or(0)
            }
            ClassDefData::Format2(ranges) => {
                for range in ranges {
                    if glyph_id >= range.start_glyph && glyph_id <= range.end_glyph {
                        return range.class;
                    }
                }
                0
            }
        }
    }
}

/// A generic sequence-lookup record shared by GSUB context/chaining-context
/// and GPOS context/chaining-context subtables (spec §4.4: "nested lookups
/// are applied in their declared order on their declared input indices").
#[derive(Debug, Clone, Copy)]
pub struct SequenceLookupRecord {
    pub sequence_index: u16,
    pub lookup_list_index: u16,
}

pub(crate) fn read_sequence_lookup_records(reader: &mut Reader, count: u16) -> Option<Vec<SequenceLookupRecord>> {
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(SequenceLookupRecord {
            sequence_index: reader.read_u16()?,
            lookup_list_index: reader.read_u16()?,
        });
    }
    Some(records)
}

pub type Tag = [u8; 4];

/// A parsed `LangSys` record: required feature plus the feature indices a
/// script/language combination turns on (spec §4.2 step 2-3: "including
/// script-language system lookup").
#[derive(Debug, Clone, Default)]
pub struct LangSys {
    pub required_feature_index: Option<u16>,
    pub feature_indices: Vec<u16>,
}

impl LangSys {
    fn parse(reader: &mut Reader) -> Option<LangSys> {
        let _lookup_order_offset = reader.read_u16()?; // reserved, always 0
        let req = reader.read_u16()?;
        let count = reader.read_u16()?;
        let mut feature_indices = Vec::with_capacity(count as usize);
        for _ in 0..count {
            feature_indices.push(reader.read_u16()?);
        }
        Some(LangSys {
            required_feature_index: if req == 0xFFFF { None } else { Some(req) },
            feature_indices,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptTable {
    pub default_lang_sys: Option<LangSys>,
    pub lang_systems: Vec<(Tag, LangSys)>,
}

impl ScriptTable {
    fn parse(data: &[u8]) -> Option<ScriptTable> {
        let mut reader = Reader::new(data);
        let default_lang_sys_offset = reader.read_u16()?;
        let lang_sys_count = reader.read_u16()?;
        let mut lang_sys_records = Vec::with_capacity(lang_sys_count as usize);
        for _ in 0..lang_sys_count {
            let tag = reader.read_tag()?;
            let offset = reader.read_u16()?;
            lang_sys_records.push((tag, offset));
        }

        let default_lang_sys = if default_lang_sys_offset != 0 {
            let mut r = Reader::new(&data[default_lang_sys_offset as usize..]);
            LangSys::parse(&mut r)
        } else {
            None
        };

        let mut lang_systems = Vec::with_capacity(lang_sys_records.len());
        for (tag, offset) in lang_sys_records {
            let mut r = Reader::new(&data[offset as usize..]);
            if let Some(ls) = LangSys::parse(&mut r) {
                lang_systems.push((tag, ls));
            }
        }

        Some(ScriptTable { default_lang_sys, lang_systems })
    }

    pub fn lang_sys(&self, language: Option<Tag>) -> Option<&LangSys> {
        if let Some(tag) = language {
            if let Some((_, ls)) = self.lang_systems.iter().find(|(t, _)| *t == tag) {
                return Some(ls);
            }
        }
        self.default_lang_sys.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptList {
    pub scripts: Vec<(Tag, ScriptTable)>,
}

impl ScriptList {
    pub fn parse(data: &[u8]) -> Option<ScriptList> {
        let mut reader = Reader::new(data);
        let count = reader.read_u16()?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = reader.read_tag()?;
            let offset = reader.read_u16()?;
            records.push((tag, offset));
        }
        let mut scripts = Vec::with_capacity(records.len());
        for (tag, offset) in records {
            if let Some(table) = ScriptTable::parse(&data[offset as usize..]) {
                scripts.push((tag, table));
            }
        }
        Some(ScriptList { scripts })
    }

    pub fn script(&self, tag: Tag) -> Option<&ScriptTable> {
        self.scripts.iter().find(|(t, _)| *t == tag).map(|(_, s)| s)
    }

    /// `DFLT`, the script used when the font has no entry matching the
    /// requested script tag.
    pub fn default_script(&self) -> Option<&ScriptTable> {
        self.script(*b"DFLT").or_else(|| self.script(*b"dflt"))
    }
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub lookup_list_indices: Vec<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureList {
    pub features: Vec<(Tag, FeatureTable)>,
}

impl FeatureList {
    pub fn parse(data: &[u8]) -> Option<FeatureList> {
        let mut reader = Reader::new(data);
        let count = reader.read_u16()?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = reader.read_tag()?;
            let offset = reader.read_u16()?;
            records.push((tag, offset));
        }
        let mut features = Vec::with_capacity(records.len());
        for (tag, offset) in records {
            let mut r = Reader::new(&data[offset as usize..]);
            let _params_offset = r.read_u16()?;
            let lookup_count = r.read_u16()?;
            let mut lookup_list_indices = Vec::with_capacity(lookup_count as usize);
            for _ in 0..lookup_count {
                lookup_list_indices.push(r.read_u16()?);
            }
            features.push((tag, FeatureTable { lookup_list_indices }));
        }
        Some(FeatureList { features })
    }

    /// All feature records (a tag can repeat, e.g. stylistic alternates),
    /// matching the given indices from a `LangSys`.
    pub fn by_indices<'a>(&'a self, indices: &'a [u16]) -> impl Iterator<Item = (Tag, &'a FeatureTable)> + 'a {
        indices.iter().filter_map(move |&i| self.features.get(i as usize).map(|(t, f)| (*t, f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_format1() {
        let data = [0x00, 0x01, 0x00, 0x03, 0x00, 0x0A, 0x00, 0x14, 0x00, 0x1E];
        let coverage = Coverage::parse(&data).unwrap();
        assert_eq!(coverage.get(10), Some(0));
        assert_eq!(coverage.get(20), Some(1));
        assert_eq!(coverage.get(15), None);
    }

    #[test]
    fn classdef_format2() {
        let data = [
            0x00, 0x02, // format 2
            0x00, 0x01, // 1 range
            0x00, 0x05, 0x00, 0x0A, 0x00, 0x02, // glyphs 5-10, class 2
        ];
        let cd = ClassDef::parse(&data).unwrap();
        assert_eq!(cd.get(7), 2);
        assert_eq!(cd.get(100), 0);
    }
}
