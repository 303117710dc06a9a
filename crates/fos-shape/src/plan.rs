//! Plan compiler (C3 + C4 selection, spec §4.2).
//!
//! Compiles a font + segment properties + user features into an immutable
//! [`Plan`]: the complex shaper selection, ordered GSUB/GPOS lookup lists
//! with per-feature mask bits, and the behavior flags §4.2 step 5
//! enumerates. Not grounded on a single teacher file — the teacher's
//! `TextShaper` (`fos-text/src/shaping/shaper.rs`) shelled out to
//! `rustybuzz` for exactly this step ("shape_with_data" takes a
//! `rustybuzz::Face` and calls `rustybuzz::shape` directly); this module is
//! the wiring SPEC_FULL.md calls out as what that file stopped short of.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::face::Face;
use crate::gdef::GdefTable;
use crate::gpos::GposTable;
use crate::gsub::GsubTable;
use crate::opentype::Tag;
use crate::segment::{Direction, SegmentProperties};
use crate::shapers::{self, ComplexShaper, ShaperKind, ZeroMarksPolicy};

/// `{ tag, value, start, end }` (spec §6). `end == GLOBAL_END` means "to
/// end of buffer".
#[derive(Debug, Clone, Copy)]
pub struct FeatureRecord {
    pub tag: Tag,
    pub value: u32,
    pub start: u32,
    pub end: u32,
}

impl FeatureRecord {
    pub const GLOBAL_END: u32 = u32::MAX;

    pub fn global(tag: Tag, value: u32) -> Self {
        FeatureRecord { tag, value, start: 0, end: Self::GLOBAL_END }
    }

    fn is_global(&self) -> bool {
        self.start == 0 && self.end == Self::GLOBAL_END
    }
}

/// One resolved feature in a compiled lookup map: its mask bit and the
/// font's lookup indices for it at this script/language (spec §4.2 step
/// 2-3: "stage-ordered list of (feature-tag, mask, lookup-indices)").
#[derive(Debug, Clone)]
pub struct LookupEntry {
    pub tag: Tag,
    pub mask: u32,
    pub lookup_indices: Vec<u16>,
}

/// The compiled GSUB or GPOS side of a plan: lookups to run, in order,
/// each gated by its mask bit.
#[derive(Debug, Clone, Default)]
pub struct FeatureMap {
    pub entries: Vec<LookupEntry>,
}

impl FeatureMap {
    pub fn mask_for(&self, tag: Tag) -> Option<u32> {
        self.entries.iter().find(|e| e.tag == tag).map(|e| e.mask)
    }
}

/// A feature whose mask only applies to a sub-range of the buffer (spec
/// §6 feature record `start`/`end`), resolved at compile time into a
/// concrete cluster range rather than re-parsed every shape call.
#[derive(Debug, Clone, Copy)]
pub struct RangedMask {
    pub mask: u32,
    pub start: u32,
    pub end: u32,
}

bitflags! {
    /// Plan behavior flags (spec §3 Plan, §4.2 step 5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PlanFlags: u32 {
        const REQUESTED_KERNING = 1 << 0;
        const HAS_FRAC = 1 << 1;
        const HAS_VERT = 1 << 2;
        const HAS_GPOS_MARK = 1 << 3;
        const ZERO_MARKS = 1 << 4;
        const FALLBACK_GLYPH_CLASSES = 1 << 5;
        const FALLBACK_MARK_POSITIONING = 1 << 6;
        const ADJUST_MARK_POSITIONING_WHEN_ZEROING = 1 << 7;
        const APPLY_GSUB = 1 << 8;
        const APPLY_GPOS = 1 << 9;
        const APPLY_KERN = 1 << 10;
        const APPLY_KERX = 1 << 11;
        const APPLY_MORX = 1 << 12;
        const APPLY_TRAK = 1 << 13;
    }
}

/// The immutable, shareable result of plan compilation (spec §3 Plan,
/// §4.2: "read-only and safe to share").
#[derive(Debug, Clone)]
pub struct Plan {
    pub props: SegmentProperties,
    pub shaper_kind: ShaperKind,
    pub gsub_map: FeatureMap,
    pub gpos_map: FeatureMap,
    pub ranged_masks: Vec<RangedMask>,
    /// OR of every feature mask that applies to the whole buffer; the
    /// driver ORs this onto every glyph's mask at setup (spec §4.3 step 1).
    pub global_mask: u32,
    pub frac_mask: u32,
    pub numr_mask: u32,
    pub dnom_mask: u32,
    pub rtlm_mask: u32,
    pub kern_mask: u32,
    pub trak_mask: u32,
    pub flags: PlanFlags,
    pub zero_marks_policy: ZeroMarksPolicy,
}

impl Plan {
    pub fn shaper(&self) -> &'static dyn ComplexShaper {
        shapers::shaper_for(self.shaper_kind)
    }
}

/// Feature requests a complex shaper or the caller can make before masks
/// are allocated (spec §4.5 `collect_features`/`override_features`).
#[derive(Default)]
pub struct PlanBuilder {
    gsub: HashMap<Tag, FeatureRecord>,
    gpos: HashMap<Tag, FeatureRecord>,
    order: Vec<Tag>,
}

impl PlanBuilder {
    fn with_defaults(direction: Direction) -> Self {
        let mut b = PlanBuilder::default();
        // Default feature set every shaper in the corpus that touches GSUB
        // ultimately reaches for (SPEC_FULL.md Ambient stack / C3).
        for tag in [*b"ccmp", *b"locl", *b"rlig", *b"liga", *b"clig", *b"calt"] {
            b.add_gsub(tag, 1);
        }
        if direction.is_backward() {
            b.add_gsub(*b"rtlm", 1);
        }
        for tag in [*b"kern", *b"mark", *b"mkmk"] {
            b.add_gpos(tag, 1);
        }
        // frac/numr/dnom are never applied globally; the driver's fraction
        // pass sets these bits on specific glyphs it detects (spec §4.2
        // step 6).
        b.add_gsub_ranged(*b"frac", 1, 0, 0);
        b.add_gsub_ranged(*b"numr", 1, 0, 0);
        b.add_gsub_ranged(*b"dnom", 1, 0, 0);
        b
    }

    pub fn add_gsub(&mut self, tag: Tag, value: u32) {
        self.add_gsub_record(FeatureRecord::global(tag, value));
    }
    pub fn add_gpos(&mut self, tag: Tag, value: u32) {
        self.add_gpos_record(FeatureRecord::global(tag, value));
    }
    pub fn add_gsub_ranged(&mut self, tag: Tag, value: u32, start: u32, end: u32) {
        self.add_gsub_record(FeatureRecord { tag, value, start, end });
    }
    pub fn disable_gsub(&mut self, tag: Tag) {
        self.add_gsub(tag, 0);
    }

    fn add_gsub_record(&mut self, rec: FeatureRecord) {
        if !self.gsub.contains_key(&rec.tag) {
            self.order.push(rec.tag);
        }
        self.gsub.insert(rec.tag, rec);
    }
    fn add_gpos_record(&mut self, rec: FeatureRecord) {
        if !self.gpos.contains_key(&rec.tag) {
            self.order.push(rec.tag);
        }
        self.gpos.insert(rec.tag, rec);
    }
}

/// `frac`/`numr`/`dnom`/`rtlm` are resolved manually by the driver, not by
/// static whole-buffer application, even though they're declared at
/// feature-map-build time (spec §4.2 step 6).
const MANUAL_TAGS: [Tag; 4] = [*b"frac", *b"numr", *b"dnom", *b"rtlm"];

/// Compile a [`Plan`] for `(face, props, user_features)` (spec §4.2).
pub fn compile(face: &dyn Face, props: SegmentProperties, user_features: &[FeatureRecord]) -> Plan {
    let shaper_kind = ShaperKind::for_script(props.script);
    let shaper = shapers::shaper_for(shaper_kind);

    let mut builder = PlanBuilder::with_defaults(props.direction);
    shaper.collect_features(&mut builder);
    for f in user_features {
        if is_gpos_tag(f.tag) {
            builder.add_gpos_record(*f);
        } else {
            builder.add_gsub_record(*f);
        }
    }
    shaper.override_features(&mut builder);

    let gsub_table = face.get_table(*b"GSUB").and_then(GsubTable::parse);
    let gpos_table = face.get_table(*b"GPOS").and_then(GposTable::parse);

    let mut next_bit = 1u32;
    let mut gsub_map = FeatureMap::default();
    let mut gpos_map = FeatureMap::default();
    let mut ranged_masks = Vec::new();
    let mut global_mask = 0u32;
    let (mut frac_mask, mut numr_mask, mut dnom_mask, mut rtlm_mask, mut kern_mask) = (0u32, 0u32, 0u32, 0u32, 0u32);

    for tag in &builder.order {
        let (from_gsub, rec) = match (builder.gsub.get(tag), builder.gpos.get(tag)) {
            (Some(r), _) => (true, *r),
            (None, Some(r)) => (false, *r),
            (None, None) => continue,
        };
        if rec.value == 0 {
            continue;
        }
        let bit = 1u32 << next_bit.min(30);
        next_bit += 1;

        let lookup_indices = if from_gsub {
            gsub_table.as_ref().map(|t| lookups_for_feature(&t.script_list, &t.feature_list, &props, rec.tag)).unwrap_or_default()
        } else {
            gpos_table.as_ref().map(|t| lookups_for_feature(&t.script_list, &t.feature_list, &props, rec.tag)).unwrap_or_default()
        };
        let entry = LookupEntry { tag: rec.tag, mask: bit, lookup_indices };
        if from_gsub {
            gsub_map.entries.push(entry);
        } else {
            gpos_map.entries.push(entry);
        }

        match rec.tag {
            t if t == *b"frac" => frac_mask = bit,
            t if t == *b"numr" => numr_mask = bit,
            t if t == *b"dnom" => dnom_mask = bit,
            t if t == *b"rtlm" => rtlm_mask = bit,
            t if t == *b"kern" => {
                kern_mask = bit;
                if rec.is_global() {
                    global_mask |= bit;
                }
            }
            _ if rec.is_global() => global_mask |= bit,
            _ => ranged_masks.push(RangedMask { mask: bit, start: rec.start, end: rec.end }),
        }
    }

    let has_frac = frac_mask != 0 && !matches!(shaper_kind, ShaperKind::Arabic);
    let gdef = face.get_table(*b"GDEF").and_then(GdefTable::parse);
    let has_gpos_mark = gpos_map.mask_for(*b"mark").map(|m| m != 0).unwrap_or(false) && gpos_table.is_some();
    let has_gdef_marks = gdef.as_ref().map(|g| g.has_mark_classification()).unwrap_or(false);

    let has_morx = face.has_table(*b"morx");
    let has_kerx = face.has_table(*b"kerx");
    let has_kern = face.has_table(*b"kern");
    let has_trak = face.has_table(*b"trak");
    let requested_tracking = user_features.iter().any(|f| f.tag == *b"trak" && f.value != 0);

    let apply_morx = shaper.prefer_morx() && has_morx;
    let apply_gpos = gpos_table.is_some() && !apply_morx;
    let apply_kern = has_kern && !(apply_gpos && has_gpos_kern_lookup(&gpos_map));
    let apply_kerx = has_kerx && !apply_gpos;
    let apply_trak = has_trak && requested_tracking;

    let mut flags = PlanFlags::APPLY_GSUB;
    flags.set(PlanFlags::HAS_FRAC, has_frac);
    flags.set(PlanFlags::HAS_VERT, props.direction.is_vertical());
    flags.set(PlanFlags::HAS_GPOS_MARK, has_gpos_mark);
    flags.set(PlanFlags::ZERO_MARKS, !apply_morx);
    flags.set(PlanFlags::FALLBACK_GLYPH_CLASSES, gdef.is_none() || !has_gdef_marks);
    flags.set(PlanFlags::FALLBACK_MARK_POSITIONING, shaper.fallback_position() && !has_gpos_mark);
    flags.set(PlanFlags::ADJUST_MARK_POSITIONING_WHEN_ZEROING, !apply_morx);
    flags.set(PlanFlags::APPLY_GPOS, apply_gpos);
    flags.set(PlanFlags::APPLY_KERN, apply_kern);
    flags.set(PlanFlags::APPLY_KERX, apply_kerx);
    flags.set(PlanFlags::APPLY_MORX, apply_morx);
    flags.set(PlanFlags::APPLY_TRAK, apply_trak);
    flags.set(PlanFlags::REQUESTED_KERNING, apply_kern || apply_kerx || (apply_gpos && kern_mask != 0));

    tracing::debug!(
        shaper = ?shaper_kind,
        script = ?props.script,
        direction = ?props.direction,
        apply_gpos,
        apply_morx,
        apply_kern,
        apply_kerx,
        "compiled shaping plan"
    );

    Plan {
        props,
        shaper_kind,
        gsub_map,
        gpos_map,
        ranged_masks,
        global_mask,
        frac_mask,
        numr_mask,
        dnom_mask,
        rtlm_mask,
        kern_mask,
        trak_mask: 0,
        flags,
        zero_marks_policy: shaper.zero_width_marks(),
    }
}

fn is_gpos_tag(tag: Tag) -> bool {
    matches!(&tag, b"kern" | b"mark" | b"mkmk" | b"curs" | b"dist" | b"vkrn")
}

fn has_gpos_kern_lookup(gpos_map: &FeatureMap) -> bool {
    gpos_map.entries.iter().any(|e| e.tag == *b"kern" && !e.lookup_indices.is_empty())
}

fn lookups_for_feature(
    script_list: &crate::opentype::ScriptList,
    feature_list: &crate::opentype::FeatureList,
    props: &SegmentProperties,
    tag: Tag,
) -> Vec<u16> {
    let script_table = script_list.script(props.script.ot_tag()).or_else(|| script_list.default_script());
    let Some(script_table) = script_table else {
        return Vec::new();
    };
    let lang_tag = ot_lang_tag(props.language.as_str());
    let Some(lang_sys) = script_table.lang_sys(lang_tag) else {
        return Vec::new();
    };
    let mut indices = Vec::new();
    for (t, feature) in feature_list.by_indices(&lang_sys.feature_indices) {
        if t == tag {
            for &idx in &feature.lookup_list_indices {
                if !indices.contains(&idx) {
                    indices.push(idx);
                }
            }
        }
    }
    indices
}

/// Best-effort BCP-47 -> OT language-tag mapping: upper-cases and
/// space-pads the primary subtag to 4 bytes. This does not implement the
/// full IANA-to-OT registry (hundreds of irregular tags like `"zh-Hans"`
/// -> `"ZHS "`); exact mapping should be resolved against font test
/// vectors rather than guessed further (spec §9 Open Question analog).
fn ot_lang_tag(language: &str) -> Option<Tag> {
    if language.is_empty() {
        return None;
    }
    let primary = language.split(['-', '_']).next().unwrap_or("");
    if primary.is_empty() {
        return None;
    }
    let mut tag = [b' '; 4];
    for (i, b) in primary.bytes().take(4).enumerate() {
        tag[i] = b.to_ascii_uppercase();
    }
    Some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Language;
    use crate::unicode::Script;

    struct EmptyFace;
    impl Face for EmptyFace {
        fn has_table(&self, _tag: [u8; 4]) -> bool {
            false
        }
        fn get_table(&self, _tag: [u8; 4]) -> Option<&[u8]> {
            None
        }
        fn get_glyph(&self, codepoint: u32, _variation_selector: u32) -> Option<crate::glyph::GlyphId> {
            Some(crate::glyph::GlyphId(codepoint as u16))
        }
        fn get_advance_h(&self, _glyph: crate::glyph::GlyphId) -> i32 {
            600
        }
        fn get_advance_v(&self, _glyph: crate::glyph::GlyphId) -> i32 {
            1000
        }
        fn get_side_bearing_h(&self, _glyph: crate::glyph::GlyphId) -> i32 {
            0
        }
        fn get_side_bearing_v(&self, _glyph: crate::glyph::GlyphId) -> i32 {
            0
        }
        fn get_glyph_extents(&self, _glyph: crate::glyph::GlyphId) -> Option<crate::face::GlyphExtents> {
            None
        }
        fn get_contour_point(&self, _glyph: crate::glyph::GlyphId, _point_index: u16) -> Option<(i32, i32)> {
            None
        }
        fn units_per_em(&self) -> u16 {
            1000
        }
    }

    #[test]
    fn compiles_without_font_tables() {
        let props = SegmentProperties::new(Direction::LeftToRight, Script::of('a'), Language::default());
        let plan = compile(&EmptyFace, props, &[]);
        assert!(!plan.flags.contains(PlanFlags::APPLY_GPOS));
        assert!(!plan.flags.contains(PlanFlags::APPLY_MORX));
        assert_eq!(plan.frac_mask, 0);
    }

    #[test]
    fn rtl_adds_rtlm_feature() {
        let props = SegmentProperties::new(Direction::RightToLeft, Script::of('ا'), Language::default());
        let plan = compile(&EmptyFace, props, &[]);
        assert_ne!(plan.rtlm_mask, 0);
    }

    #[test]
    fn user_feature_overrides_default() {
        let props = SegmentProperties::new(Direction::LeftToRight, Script::of('a'), Language::default());
        let user = [FeatureRecord::global(*b"liga", 0)];
        let plan = compile(&EmptyFace, props, &user);
        // liga disabled: no mask bit allocated for it in gsub_map.
        assert!(plan.gsub_map.mask_for(*b"liga").is_none());
    }
}
