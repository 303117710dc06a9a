//! The shape driver (C8, spec §4.3): orchestrates every pass in order.
//! Not ported from a single teacher file — the teacher's `TextShaper`
//! (`fos-text/src/shaping/shaper.rs`) delegated this entire sequence to
//! `rustybuzz::shape` in one call; this module is what that delegation
//! stood in for, built from the primitives (`Buffer`, `GsubTable`,
//! `GposTable`, `GdefTable`, `KernTable`, the normalizer, the complex
//! shapers) the rest of this crate now provides natively.

use crate::buffer::{Buffer, BufferFlags, ContentType};
use crate::face::Face;
use crate::gdef::GdefTable;
use crate::gpos;
use crate::gsub;
use crate::kern;
use crate::normalize;
use crate::plan::{Plan, PlanFlags};
use crate::shapers::ZeroMarksPolicy;
use crate::unicode::{is_default_ignorable, is_mirrored};

/// Bit in `GlyphVar::unicode_props` recording "this codepoint was
/// default-ignorable" — stashed before `map_to_glyphs` overwrites
/// `codepoint` with a glyph id, so cleanup can still find it afterward.
const UPROPS_DEFAULT_IGNORABLE: u8 = 0x01;

/// Run the full shaping pipeline over `buffer` in place (spec §4.3).
/// `buffer.segment_properties()` must already be resolved — callers that
/// don't know direction/script/language up front should call
/// [`Buffer::guess_segment_properties`] first.
pub fn shape(plan: &Plan, face: &dyn Face, buffer: &mut Buffer) {
    if buffer.is_empty() {
        return;
    }
    let shaper = plan.shaper();

    // Setup (spec §4.3 step 1): reverse RTL buffers on entry so every
    // downstream pass — normalization's mark reordering, the complex
    // shaper, and GSUB/GPOS's backtrack/input/lookahead windows — runs
    // over the run in visual (left-to-right) order. Cleanup reverses back
    // at step 7.
    if buffer.direction().is_backward() {
        buffer.reverse();
    }

    mark_default_ignorables(buffer);
    shaper.preprocess_text(buffer);

    let insert_dotted_circle = !buffer.flags().contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE);
    normalize::normalize(buffer, shaper.normalization_preference(), insert_dotted_circle);

    apply_static_masks(plan, buffer);
    shaper.setup_masks(buffer, &plan.gsub_map);
    apply_rtlm_mask(plan, buffer);
    apply_fraction_masks(plan, buffer);

    map_to_glyphs(face, buffer);
    init_advances(face, buffer);

    let gdef = face.get_table(*b"GDEF").and_then(GdefTable::parse).unwrap_or_else(GdefTable::empty);

    if plan.flags.contains(PlanFlags::APPLY_GSUB) {
        if let Some(table) = face.get_table(*b"GSUB").and_then(gsub::GsubTable::parse) {
            for entry in &plan.gsub_map.entries {
                for &lookup_index in &entry.lookup_indices {
                    gsub::apply_lookup(&table, &gdef, buffer, lookup_index, entry.mask);
                }
            }
        }
    }
    if plan.flags.contains(PlanFlags::APPLY_MORX) {
        tracing::debug!("morx table present but AAT ligature/rearrangement interpretation is out of scope, skipping");
    }

    shaper.postprocess_glyphs(buffer);

    if shaper.zero_width_marks() == ZeroMarksPolicy::Before {
        zero_mark_advances(buffer, &gdef);
    }

    if plan.flags.contains(PlanFlags::APPLY_GPOS) {
        if let Some(table) = face.get_table(*b"GPOS").and_then(gpos::GposTable::parse) {
            for entry in &plan.gpos_map.entries {
                for &lookup_index in &entry.lookup_indices {
                    gpos::apply_lookup(&table, &gdef, buffer, lookup_index, entry.mask);
                }
            }
        }
    } else if plan.flags.contains(PlanFlags::APPLY_KERN) {
        if let Some(table) = face.get_table(*b"kern").and_then(kern::KernTable::parse) {
            kern::apply_kern(&table, buffer);
        }
    }
    if plan.flags.contains(PlanFlags::APPLY_KERX) {
        tracing::debug!("kerx table present but AAT state-table interpretation is out of scope, skipping");
    }
    if plan.flags.contains(PlanFlags::APPLY_TRAK) {
        tracing::debug!("trak table present but tracking-table interpretation is out of scope, skipping");
    }

    if shaper.zero_width_marks() == ZeroMarksPolicy::After {
        zero_mark_advances(buffer, &gdef);
    }

    hide_default_ignorables(buffer);
    propagate_unsafe_to_break(buffer);

    if buffer.direction().is_backward() {
        buffer.reverse();
    }
    buffer.set_content_type(ContentType::Glyphs);
}

/// Cleanup (spec §4.3 step 7): if any glyph in a cluster carries
/// `UNSAFE_TO_BREAK`, OR it onto every glyph sharing that cluster value
/// (spec §3, §8 "unsafe-to-break propagation"). Reordering and
/// positioning passes can leave the flag on only one member of a cluster;
/// this is the final pass that restores the invariant before output.
fn propagate_unsafe_to_break(buffer: &mut Buffer) {
    let flagged: std::collections::HashSet<u32> = buffer
        .glyph_infos()
        .iter()
        .filter(|g| g.unsafe_to_break())
        .map(|g| g.cluster)
        .collect();
    for info in buffer.glyph_infos_mut() {
        if flagged.contains(&info.cluster) {
            info.set_unsafe_to_break();
        }
    }
}

fn mark_default_ignorables(buffer: &mut Buffer) {
    for info in buffer.glyph_infos_mut() {
        if char::from_u32(info.codepoint).map(is_default_ignorable).unwrap_or(false) {
            info.var.set_unicode_props(UPROPS_DEFAULT_IGNORABLE);
        }
    }
}

/// OR the plan's global mask into every glyph, then OR in any ranged
/// mask whose `[start,end)` covers the glyph's cluster (spec §4.2 step 6,
/// §4.3 step 1).
fn apply_static_masks(plan: &Plan, buffer: &mut Buffer) {
    for info in buffer.glyph_infos_mut() {
        info.mask |= plan.global_mask;
    }
    for ranged in &plan.ranged_masks {
        for info in buffer.glyph_infos_mut() {
            if info.cluster >= ranged.start && info.cluster < ranged.end {
                info.mask |= ranged.mask;
            }
        }
    }
}

/// Tag mirrorable punctuation with the `rtlm` mask in a right-to-left run
/// (spec §4.2 step 6: "rtlm... content-dependent, resolved by the driver").
fn apply_rtlm_mask(plan: &Plan, buffer: &mut Buffer) {
    if plan.rtlm_mask == 0 || !buffer.direction().is_backward() {
        return;
    }
    for info in buffer.glyph_infos_mut() {
        if char::from_u32(info.codepoint).map(is_mirrored).unwrap_or(false) {
            info.mask |= plan.rtlm_mask;
        }
    }
}

const FRACTION_SLASH: u32 = 0x2044;

/// Find `digits '/' digits` runs and tag them `numr`/`frac`/`dnom` (spec
/// §4.2 step 6).
fn apply_fraction_masks(plan: &Plan, buffer: &mut Buffer) {
    if plan.frac_mask == 0 && plan.numr_mask == 0 && plan.dnom_mask == 0 {
        return;
    }
    let len = buffer.len();
    let mut i = 0;
    while i < len {
        if buffer.glyph_infos()[i].codepoint != FRACTION_SLASH {
            i += 1;
            continue;
        }
        let mut start = i;
        while start > 0 && is_ascii_digit(buffer.glyph_infos()[start - 1].codepoint) {
            start -= 1;
        }
        let mut end = i + 1;
        while end < len && is_ascii_digit(buffer.glyph_infos()[end].codepoint) {
            end += 1;
        }
        if start == i || end == i + 1 {
            i += 1;
            continue;
        }
        for info in &mut buffer.glyph_infos_mut()[start..i] {
            info.mask |= plan.numr_mask;
        }
        buffer.glyph_infos_mut()[i].mask |= plan.frac_mask;
        for info in &mut buffer.glyph_infos_mut()[i + 1..end] {
            info.mask |= plan.dnom_mask;
        }
        i = end;
    }
}

fn is_ascii_digit(codepoint: u32) -> bool {
    (0x30..=0x39).contains(&codepoint)
}

/// Map each `codepoint` (a Unicode scalar) to the font's glyph id (spec
/// §4.3 step 3, "map to glyphs"). A codepoint the font has no glyph for
/// falls back to `.notdef` (0) with a debug log, not an error.
fn map_to_glyphs(face: &dyn Face, buffer: &mut Buffer) {
    for info in buffer.glyph_infos_mut() {
        let cp = info.codepoint;
        match face.get_glyph(cp, 0) {
            Some(glyph) => info.codepoint = glyph.0 as u32,
            None => {
                tracing::debug!(codepoint = cp, "no glyph for codepoint, using .notdef");
                info.codepoint = 0;
            }
        }
    }
}

/// Seed every glyph's advance from the font's own metrics (spec §4.3 step
/// 6, "initialize advances from font horizontal/vertical metrics") before
/// GPOS/kern/kerx perturb them. Vertical runs advance along `y`; everything
/// else advances along `x`, matching the rest of the driver's convention of
/// treating TTB/BTT as the only vertical directions.
fn init_advances(face: &dyn Face, buffer: &mut Buffer) {
    let vertical = buffer.direction().is_vertical();
    let len = buffer.len();
    for i in 0..len {
        let glyph = crate::glyph::GlyphId(buffer.glyph_infos()[i].codepoint as u16);
        let pos = &mut buffer.glyph_positions_mut()[i];
        if vertical {
            pos.y_advance = face.get_advance_v(glyph);
        } else {
            pos.x_advance = face.get_advance_h(glyph);
        }
    }
}

/// Zero advances on glyphs GDEF classifies as marks (spec §4.3 step 5) —
/// offsets from GPOS mark attachment (or the pre-attachment default of
/// zero) are kept, only the contribution to pen advance is removed, so a
/// stack of combining marks doesn't visually push later glyphs apart.
fn zero_mark_advances(buffer: &mut Buffer, gdef: &GdefTable) {
    let len = buffer.len();
    for i in 0..len {
        let glyph = buffer.glyph_infos()[i].codepoint as u16;
        if gdef.glyph_class(glyph) == crate::gdef::GlyphClass::Mark {
            let pos = &mut buffer.glyph_positions_mut()[i];
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}

/// Hide or remove default-ignorable glyphs (spec §4.3 step 7,
/// `PRESERVE_DEFAULT_IGNORABLES`/`REMOVE_DEFAULT_IGNORABLES`).
fn hide_default_ignorables(buffer: &mut Buffer) {
    if buffer.flags().contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES) {
        return;
    }
    if buffer.flags().contains(BufferFlags::REMOVE_DEFAULT_IGNORABLES) {
        buffer.set_idx(0);
        loop {
            if buffer.idx() >= buffer.len() {
                break;
            }
            if buffer.glyph_infos()[buffer.idx()].var.unicode_props() & UPROPS_DEFAULT_IGNORABLE != 0 {
                buffer.replace_glyphs(1, &[]);
            } else {
                buffer.next_glyph();
            }
        }
        buffer.swap_buffers();
        return;
    }
    let invisible = buffer.invisible_glyph();
    let len = buffer.len();
    for i in 0..len {
        if buffer.glyph_infos()[i].var.unicode_props() & UPROPS_DEFAULT_IGNORABLE != 0 {
            buffer.glyph_infos_mut()[i].codepoint = invisible;
            let pos = &mut buffer.glyph_positions_mut()[i];
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::GlyphId;
    use crate::segment::{Direction, Language, SegmentProperties};
    use crate::unicode::Script;

    struct StubFace;
    impl Face for StubFace {
        fn has_table(&self, _tag: [u8; 4]) -> bool {
            false
        }
        fn get_table(&self, _tag: [u8; 4]) -> Option<&[u8]> {
            None
        }
        fn get_glyph(&self, codepoint: u32, _variation_selector: u32) -> Option<GlyphId> {
            Some(GlyphId(codepoint as u16))
        }
        fn get_advance_h(&self, _glyph: GlyphId) -> i32 {
            500
        }
        fn get_advance_v(&self, _glyph: GlyphId) -> i32 {
            1000
        }
        fn get_side_bearing_h(&self, _glyph: GlyphId) -> i32 {
            0
        }
        fn get_side_bearing_v(&self, _glyph: GlyphId) -> i32 {
            0
        }
        fn get_glyph_extents(&self, _glyph: GlyphId) -> Option<crate::face::GlyphExtents> {
            None
        }
        fn get_contour_point(&self, _glyph: GlyphId, _point_index: u16) -> Option<(i32, i32)> {
            None
        }
        fn units_per_em(&self) -> u16 {
            1000
        }
    }

    #[test]
    fn shape_empty_buffer_is_noop() {
        let mut buffer = Buffer::new();
        let props = SegmentProperties::new(Direction::LeftToRight, Script::of('a'), Language::default());
        let plan = crate::plan::compile(&StubFace, props, &[]);
        shape(&plan, &StubFace, &mut buffer);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn shape_maps_codepoints_to_glyphs_and_marks_glyph_content() {
        let mut buffer = Buffer::new();
        buffer.add('a' as u32, 0);
        buffer.add('b' as u32, 1);
        buffer.set_length(2);
        let props = SegmentProperties::new(Direction::LeftToRight, Script::of('a'), Language::default());
        buffer.set_segment_properties(props.clone());
        let plan = crate::plan::compile(&StubFace, props, &[]);
        shape(&plan, &StubFace, &mut buffer);
        assert_eq!(buffer.content_type(), ContentType::Glyphs);
        assert_eq!(buffer.glyph_infos()[0].codepoint, 'a' as u32);
    }

    /// Spec §8 scenario 1 (ASCII round-trip): one glyph per code point,
    /// cluster == input index, advance == the font's horizontal advance.
    #[test]
    fn ascii_round_trip_without_gsub_gpos_or_kern() {
        let mut buffer = Buffer::new();
        buffer.add('A' as u32, 0);
        buffer.add('V' as u32, 1);
        buffer.set_length(2);
        let props = SegmentProperties::new(Direction::LeftToRight, Script::of('A'), Language::default());
        buffer.set_segment_properties(props.clone());
        let plan = crate::plan::compile(&StubFace, props, &[]);
        shape(&plan, &StubFace, &mut buffer);
        assert_eq!(buffer.len(), 2);
        for (i, info) in buffer.glyph_infos().iter().enumerate() {
            assert_eq!(info.cluster, i as u32);
        }
        for pos in buffer.glyph_positions() {
            assert_eq!(pos.x_advance, 500);
            assert_eq!(pos.y_advance, 0);
        }
    }

    #[test]
    fn rtl_buffer_entry_and_exit_reversal_cancel_without_reordering_passes() {
        // Spec §4.3 reverses RTL buffers twice: once on entry (step 1, so
        // GSUB/GPOS context windows see visual order) and once in cleanup
        // (step 7, back to the order ready for rendering). With no GSUB/GPOS
        // table and no complex-shaper reordering in between (StubFace has no
        // tables), the two reversals cancel and the glyph order matches the
        // original input order.
        let mut buffer = Buffer::new();
        buffer.add('a' as u32, 0);
        buffer.add('b' as u32, 1);
        buffer.set_length(2);
        let props = SegmentProperties::new(Direction::RightToLeft, Script::of('ا'), Language::default());
        buffer.set_segment_properties(props.clone());
        let plan = crate::plan::compile(&StubFace, props, &[]);
        shape(&plan, &StubFace, &mut buffer);
        assert_eq!(buffer.glyph_infos()[0].codepoint, 'a' as u32);
        assert_eq!(buffer.glyph_infos()[1].codepoint, 'b' as u32);
    }
}
