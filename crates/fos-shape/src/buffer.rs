//! Buffer (C2): the double-sided working array the shape driver runs the
//! whole pipeline through.
//!
//! Grounded on the teacher's `shaping/run.rs` output types generalized to
//! the full data model spec §3 describes (glyph info `var1`/`var2` scratch
//! fields, feature masks, cluster tracking, in/out double buffering) — the
//! teacher's `ShapedGlyph` only carried the tail end of this (advance,
//! offset, glyph id) and is superseded here, not reused directly, since it
//! has no notion of an editable in-progress buffer at all.

use crate::segment::{Direction, Language, SegmentProperties};
use crate::unicode::Script;
use bitflags::bitflags;

pub const UNSAFE_TO_BREAK: u32 = 0x0000_0001;

bitflags! {
    /// Buffer-level flags the caller sets before shaping (spec §3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferFlags: u32 {
        const BOT = 1 << 0;
        const EOT = 1 << 1;
        const PRESERVE_DEFAULT_IGNORABLES = 1 << 2;
        const REMOVE_DEFAULT_IGNORABLES = 1 << 3;
        const DO_NOT_INSERT_DOTTED_CIRCLE = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLevel {
    MonotoneGraphemes,
    MonotoneCharacters,
    Characters,
}

impl Default for ClusterLevel {
    fn default() -> Self {
        ClusterLevel::MonotoneGraphemes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Unicode,
    Glyphs,
}

/// Phase-local scratch overlay for `var1`/`var2` (spec §9 design note).
/// Each phase documents which field it's using; nothing here is load
/// bearing across a phase boundary other than by convention, matching the
/// source's own reuse of two raw scratch words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlyphVar {
    pub var1: u32,
    pub var2: u32,
}

impl GlyphVar {
    /// `var1` low byte during normalize/shaper preprocess: Unicode general
    /// category group tag, used by mark-reordering and syllable logic.
    pub fn unicode_props(self) -> u8 {
        (self.var1 & 0xFF) as u8
    }
    pub fn set_unicode_props(&mut self, props: u8) {
        self.var1 = (self.var1 & !0xFF) | props as u32;
    }

    /// `var1` high bytes during GSUB: ligature id, shared by all components
    /// of a not-yet-fully-formed ligature.
    pub fn lig_id(self) -> u32 {
        self.var1 >> 8
    }
    pub fn set_lig_id(&mut self, id: u32) {
        self.var1 = (self.var1 & 0xFF) | (id << 8);
    }

    /// `var2` during GSUB: 1-based component index within a ligature, 0 if
    /// not part of one.
    pub fn lig_comp(self) -> u8 {
        (self.var2 & 0xFF) as u8
    }
    pub fn set_lig_comp(&mut self, comp: u8) {
        self.var2 = (self.var2 & !0xFF) | comp as u32;
    }

    /// `var2` during GPOS: attach-type/attach-chain encoding for cursive
    /// and mark-attachment bookkeeping (high byte = chain delta as i8).
    pub fn attach_chain(self) -> i8 {
        ((self.var2 >> 8) & 0xFF) as i8
    }
    pub fn set_attach_chain(&mut self, delta: i8) {
        self.var2 = (self.var2 & 0xFF) | ((delta as u8 as u32) << 8);
    }
}

/// `{codepoint, mask, cluster, var1, var2}` (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlyphInfo {
    pub codepoint: u32,
    pub mask: u32,
    pub cluster: u32,
    pub var: GlyphVar,
}

impl GlyphInfo {
    pub fn unsafe_to_break(&self) -> bool {
        self.mask & UNSAFE_TO_BREAK != 0
    }
    pub fn set_unsafe_to_break(&mut self) {
        self.mask |= UNSAFE_TO_BREAK;
    }
}

/// `{x_advance, y_advance, x_offset, y_offset, var}` in font units (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlyphPosition {
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub var: u32,
}

/// Default replacement codepoint for ill-formed UTF-8 input (U+FFFD).
pub const DEFAULT_REPLACEMENT_CODEPOINT: u32 = 0xFFFD;

/// The double-sided working array the driver runs the whole pipeline
/// through (spec §4.1).
pub struct Buffer {
    props: SegmentProperties,
    flags: BufferFlags,
    cluster_level: ClusterLevel,
    content_type: ContentType,
    replacement_codepoint: u32,
    invisible_glyph: u32,
    scratch_flags: u32,

    info: Vec<GlyphInfo>,
    pos: Vec<GlyphPosition>,

    /// Read cursor into `info`/`pos` while they hold the "in" side of a
    /// pass (before `swap_buffers`).
    idx: usize,
    /// Output accumulator. After `swap_buffers`, this becomes the new
    /// primary and `info`/`pos` are cleared to receive the next pass.
    out_info: Vec<GlyphInfo>,
    out_pos: Vec<GlyphPosition>,

    allocation_successful: bool,
    max_len_factor: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Buffer {
            props: SegmentProperties::default(),
            flags: BufferFlags::empty(),
            cluster_level: ClusterLevel::default(),
            content_type: ContentType::Unicode,
            replacement_codepoint: DEFAULT_REPLACEMENT_CODEPOINT,
            invisible_glyph: 0,
            scratch_flags: 0,
            info: Vec::new(),
            pos: Vec::new(),
            idx: 0,
            out_info: Vec::new(),
            out_pos: Vec::new(),
            allocation_successful: true,
            // spec §5: hard cap on the order of 2^32 glyph cells; kept
            // configurable as a length-of-input multiplier the way the
            // source bounds buffer growth relative to input size.
            max_len_factor: 1 << 16,
        }
    }

    pub fn reset(&mut self) {
        self.clear_contents();
        self.props = SegmentProperties::default();
        self.flags = BufferFlags::empty();
        self.cluster_level = ClusterLevel::default();
        self.replacement_codepoint = DEFAULT_REPLACEMENT_CODEPOINT;
        self.invisible_glyph = 0;
        self.allocation_successful = true;
    }

    pub fn clear_contents(&mut self) {
        self.content_type = ContentType::Unicode;
        self.info.clear();
        self.pos.clear();
        self.out_info.clear();
        self.out_pos.clear();
        self.idx = 0;
    }

    pub fn clear_output(&mut self) {
        self.out_info.clear();
        self.out_pos.clear();
    }

    pub fn allocation_successful(&self) -> bool {
        self.allocation_successful
    }

    fn fail_allocation(&mut self) -> bool {
        self.allocation_successful = false;
        false
    }

    /// Preallocate `n` glyph cells on both sides. Returns false (and sets
    /// the sticky failure flag) iff the request exceeds the configured cap
    /// (spec §5, §4.1: `set_length` fails iff allocation fails).
    pub fn ensure(&mut self, n: usize) -> bool {
        if !self.allocation_successful {
            return false;
        }
        let cap = self.max_len_factor.max(64);
        if n > cap {
            return self.fail_allocation();
        }
        if self.info.capacity() < n {
            self.info.reserve(n - self.info.len());
            self.pos.reserve(n.saturating_sub(self.pos.len()));
        }
        true
    }

    /// Public entry point named after the exposed Buffer API (spec §6);
    /// same semantics as [`Buffer::ensure`].
    pub fn pre_allocate(&mut self, n: usize) -> bool {
        self.ensure(n)
    }

    pub fn set_length(&mut self, n: usize) -> bool {
        if !self.ensure(n) {
            return false;
        }
        self.info.resize(n, GlyphInfo::default());
        self.pos.resize(n, GlyphPosition::default());
        true
    }

    pub fn len(&self) -> usize {
        self.info.len()
    }
    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
    pub fn out_len(&self) -> usize {
        self.out_info.len()
    }
    pub fn idx(&self) -> usize {
        self.idx
    }
    pub fn set_idx(&mut self, idx: usize) {
        self.idx = idx;
    }

    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        &self.info
    }
    pub fn glyph_infos_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.info
    }
    /// Already-processed glyphs on the output side of the current pass —
    /// the backtrack context a context/chaining-context lookup matches
    /// against while mid-pass (spec §4.4).
    pub fn out_glyph_infos(&self) -> &[GlyphInfo] {
        &self.out_info
    }
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        &self.pos
    }
    pub fn glyph_positions_mut(&mut self) -> &mut [GlyphPosition] {
        &mut self.pos
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }
    pub fn set_content_type(&mut self, ct: ContentType) {
        self.content_type = ct;
    }

    pub fn segment_properties(&self) -> &SegmentProperties {
        &self.props
    }
    pub fn set_segment_properties(&mut self, props: SegmentProperties) {
        self.props = props;
    }
    pub fn direction(&self) -> Direction {
        self.props.direction
    }
    pub fn set_direction(&mut self, d: Direction) {
        self.props.direction = d;
    }
    pub fn script(&self) -> Script {
        self.props.script
    }
    pub fn set_script(&mut self, s: Script) {
        self.props.script = s;
    }
    pub fn language(&self) -> &Language {
        &self.props.language
    }
    pub fn set_language(&mut self, l: Language) {
        self.props.language = l;
    }

    pub fn flags(&self) -> BufferFlags {
        self.flags
    }
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.flags = flags;
    }
    pub fn cluster_level(&self) -> ClusterLevel {
        self.cluster_level
    }
    pub fn set_cluster_level(&mut self, level: ClusterLevel) {
        self.cluster_level = level;
    }
    pub fn replacement_codepoint(&self) -> u32 {
        self.replacement_codepoint
    }
    pub fn set_replacement_codepoint(&mut self, cp: u32) {
        self.replacement_codepoint = cp;
    }
    pub fn invisible_glyph(&self) -> u32 {
        self.invisible_glyph
    }
    pub fn set_invisible_glyph(&mut self, g: u32) {
        self.invisible_glyph = g;
    }
    pub fn scratch_flags(&self) -> u32 {
        self.scratch_flags
    }
    pub fn set_scratch_flags(&mut self, f: u32) {
        self.scratch_flags = f;
    }

    /// Guess direction/script from the first real-script codepoint when
    /// the caller left `direction` unset (spec §4.3 step 1).
    pub fn guess_segment_properties(&mut self) {
        if self.props.script == Script::UNKNOWN || !self.props.script.is_real() {
            for g in &self.info {
                if let Some(c) = char::from_u32(g.codepoint) {
                    let s = Script::of(c);
                    if s.is_real() {
                        self.props.script = s;
                        break;
                    }
                }
            }
        }
        if !self.props.direction.is_valid() {
            self.props.direction = self.props.script.horizontal_direction();
        }
    }

    // -- ingestion --------------------------------------------------

    pub fn add(&mut self, codepoint: u32, cluster: u32) {
        if !self.allocation_successful {
            return;
        }
        if !self.ensure(self.info.len() + 1) {
            return;
        }
        self.info.push(GlyphInfo { codepoint, mask: 0, cluster, var: GlyphVar::default() });
        self.pos.push(GlyphPosition::default());
    }

    /// Decode `bytes[item_offset..item_offset+item_length]` as UTF-8,
    /// replacing ill-formed sequences with `replacement_codepoint` (spec
    /// §4.1). Cluster values are the byte offset of each scalar, matching
    /// the "cluster identifies the originating input position" invariant.
    pub fn add_utf8(&mut self, bytes: &[u8], item_offset: usize, item_length: usize) {
        let end = (item_offset + item_length).min(bytes.len());
        let mut i = item_offset;
        while i < end {
            match std::str::from_utf8(&bytes[i..end]) {
                Ok(s) => {
                    for c in s.chars() {
                        self.add(c as u32, i as u32);
                        i += c.len_utf8();
                    }
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if valid_up_to > 0 {
                        for c in std::str::from_utf8(&bytes[i..i + valid_up_to]).unwrap().chars() {
                            self.add(c as u32, i as u32);
                            i += c.len_utf8();
                        }
                    }
                    self.add(self.replacement_codepoint, i as u32);
                    i += e.error_len().unwrap_or(1).max(1);
                }
            }
        }
    }

    pub fn append(&mut self, src: &Buffer, start: usize, end: usize) {
        let end = end.min(src.info.len());
        if start >= end {
            return;
        }
        if !self.ensure(self.info.len() + (end - start)) {
            return;
        }
        self.info.extend_from_slice(&src.info[start..end]);
        self.pos.extend_from_slice(&src.pos[start..end]);
    }

    // -- pass mutators (spec §4.1, §9: the only mutators during a pass) --

    pub fn next_glyph(&mut self) {
        if self.idx >= self.info.len() {
            return;
        }
        self.out_info.push(self.info[self.idx]);
        self.out_pos.push(self.pos[self.idx]);
        self.idx += 1;
    }

    pub fn replace_glyph(&mut self, glyph: u32) {
        if self.idx >= self.info.len() {
            return;
        }
        let mut g = self.info[self.idx];
        g.codepoint = glyph;
        self.out_info.push(g);
        self.out_pos.push(self.pos[self.idx]);
        self.idx += 1;
    }

    /// n -> m substitution. Output cluster = min cluster of the `num_in`
    /// consumed inputs (spec §4.1, testable property "cluster minimality").
    pub fn replace_glyphs(&mut self, num_in: usize, data: &[u32]) {
        let n = num_in.min(self.info.len() - self.idx);
        if n == 0 {
            return;
        }
        let window = &self.info[self.idx..self.idx + n];
        let min_cluster = window.iter().map(|g| g.cluster).min().unwrap_or(0);
        let spans_clusters = window.iter().any(|g| g.cluster != min_cluster);
        let unsafe_flag = spans_clusters || window.iter().any(|g| g.unsafe_to_break());
        for &glyph in data {
            let mut info = GlyphInfo {
                codepoint: glyph,
                mask: window[0].mask,
                cluster: min_cluster,
                var: GlyphVar::default(),
            };
            if unsafe_flag {
                info.set_unsafe_to_break();
            }
            self.out_info.push(info);
            self.out_pos.push(GlyphPosition::default());
        }
        self.idx += n;
    }

    pub fn output_glyph(&mut self, glyph: u32, cluster: u32) {
        self.out_info.push(GlyphInfo { codepoint: glyph, mask: 0, cluster, var: GlyphVar::default() });
        self.out_pos.push(GlyphPosition::default());
    }

    pub fn output_info(&mut self, info: GlyphInfo) {
        self.out_info.push(info);
        self.out_pos.push(GlyphPosition::default());
    }

    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.info, &mut self.out_info);
        std::mem::swap(&mut self.pos, &mut self.out_pos);
        self.out_info.clear();
        self.out_pos.clear();
        self.idx = 0;
    }

    // -- reordering ---------------------------------------------------

    pub fn reverse(&mut self) {
        self.info.reverse();
        self.pos.reverse();
    }

    pub fn reverse_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.info.len());
        if start < end {
            self.info[start..end].reverse();
            self.pos[start..end].reverse();
        }
    }

    /// Reverse glyph order within each maximal span of equal-cluster
    /// glyphs (spec §4.1). Used after RTL shaping to restore visual order
    /// of ligature/multi-glyph clusters without disturbing cluster values.
    pub fn reverse_clusters(&mut self) {
        let mut start = 0;
        while start < self.info.len() {
            let cluster = self.info[start].cluster;
            let mut end = start + 1;
            while end < self.info.len() && self.info[end].cluster == cluster {
                end += 1;
            }
            self.reverse_range(start, end);
            start = end;
        }
    }

    /// Renumber clusters to their position index, from the current
    /// minimum cluster value rather than from zero — chosen per spec §9's
    /// open question because the alternative (renumbering from absolute
    /// zero) would corrupt cluster values on any buffer built via `append`
    /// from a non-zero offset, violating append commutativity (spec §8).
    /// See DESIGN.md for the recorded rationale.
    pub fn reset_clusters(&mut self) {
        if self.info.is_empty() {
            return;
        }
        let base = self.info.iter().map(|g| g.cluster).min().unwrap_or(0);
        for (i, g) in self.info.iter_mut().enumerate() {
            g.cluster = base + i as u32;
        }
    }

    /// Assign the minimum cluster across `[start,end)` to every glyph in
    /// the range, extended per `cluster_level`, and OR `UNSAFE_TO_BREAK`
    /// into the merged span (spec §4.1, §9: the one centralized primitive
    /// cluster merges must go through).
    pub fn merge_clusters(&mut self, start: usize, end: usize) {
        merge_clusters_in(&mut self.info, start, end, self.cluster_level);
    }

    pub fn merge_out_clusters(&mut self, start: usize, end: usize) {
        merge_clusters_in(&mut self.out_info, start, end, self.cluster_level);
    }

    /// Mark `UNSAFE_TO_BREAK` on the whole cluster spanning `[start,end)`
    /// without otherwise touching cluster values.
    pub fn unsafe_to_break(&mut self, start: usize, end: usize) {
        let end = end.min(self.info.len());
        if start >= end {
            return;
        }
        let lo = self.info[start..end].iter().map(|g| g.cluster).min().unwrap();
        let hi = self.info[start..end].iter().map(|g| g.cluster).max().unwrap();
        for g in self.info.iter_mut() {
            if g.cluster >= lo && g.cluster <= hi {
                g.set_unsafe_to_break();
            }
        }
    }

    /// Stable sort on the *in* side over `[start,end)`, used for canonical
    /// mark reordering (spec §4.1, §4.3 step 2). `cmp` compares `GlyphInfo`
    /// by whatever key the caller needs (combining class during
    /// normalization).
    pub fn sort<F>(&mut self, start: usize, end: usize, mut cmp: F)
    where
        F: FnMut(&GlyphInfo, &GlyphInfo) -> std::cmp::Ordering,
    {
        let end = end.min(self.info.len());
        if start >= end {
            return;
        }
        // clusters must not cross during a stable sort restricted to one
        // cluster's mark span; callers are expected to pass same-cluster
        // ranges (normalizer upholds this).
        let slice = &mut self.info[start..end];
        let pos_slice = &mut self.pos[start..end];
        let mut idxs: Vec<usize> = (0..slice.len()).collect();
        idxs.sort_by(|&a, &b| cmp(&slice[a], &slice[b]));
        let infos: Vec<GlyphInfo> = idxs.iter().map(|&i| slice[i]).collect();
        let positions: Vec<GlyphPosition> = idxs.iter().map(|&i| pos_slice[i]).collect();
        slice.copy_from_slice(&infos);
        pos_slice.copy_from_slice(&positions);
    }
}

fn merge_clusters_in(info: &mut [GlyphInfo], start: usize, end: usize, level: ClusterLevel) {
    let end = end.min(info.len());
    if start >= end || info.is_empty() {
        return;
    }

    let (mut lo, mut hi) = (start, end);
    if level != ClusterLevel::Characters {
        // extend leftward/rightward until monotone w.r.t. neighboring
        // cluster values (spec §4.1: "extended leftward and rightward
        // until monotonicity is restored").
        while lo > 0 && info[lo - 1].cluster == info[lo].cluster {
            lo -= 1;
        }
        while hi < info.len() && hi > 0 && info[hi].cluster == info[hi - 1].cluster {
            hi += 1;
        }
    }

    let min_cluster = info[lo..hi].iter().map(|g| g.cluster).min().unwrap();
    let spans_clusters = info[lo..hi].iter().any(|g| g.cluster != min_cluster);
    let any_unsafe = spans_clusters || info[lo..hi].iter().any(|g| g.unsafe_to_break());
    for g in &mut info[lo..hi] {
        g.cluster = min_cluster;
        if any_unsafe {
            g.set_unsafe_to_break();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_length() {
        let mut b = Buffer::new();
        b.add('a' as u32, 0);
        b.add('b' as u32, 1);
        assert_eq!(b.len(), 2);
        assert!(b.allocation_successful());
    }

    #[test]
    fn add_utf8_replaces_invalid() {
        let mut b = Buffer::new();
        let bytes = [0x41, 0xFF, 0x42]; // 'A', invalid, 'B'
        b.add_utf8(&bytes, 0, bytes.len());
        let cps: Vec<u32> = b.glyph_infos().iter().map(|g| g.codepoint).collect();
        assert_eq!(cps, vec!['A' as u32, DEFAULT_REPLACEMENT_CODEPOINT, 'B' as u32]);
    }

    #[test]
    fn replace_glyphs_takes_min_cluster() {
        let mut b = Buffer::new();
        b.add('f' as u32, 0);
        b.add('i' as u32, 1);
        b.set_length(2);
        b.glyph_infos_mut()[0].cluster = 0;
        b.glyph_infos_mut()[1].cluster = 1;
        b.replace_glyphs(2, &[999]);
        b.swap_buffers();
        assert_eq!(b.len(), 1);
        assert_eq!(b.glyph_infos()[0].cluster, 0);
    }

    #[test]
    fn replace_glyphs_sets_unsafe_to_break_when_spanning_clusters() {
        // Spec §8 scenario 2: f+i -> fi ligature must carry UNSAFE_TO_BREAK
        // even though neither input glyph had it set, since the merge spans
        // two distinct input clusters.
        let mut b = Buffer::new();
        b.add('f' as u32, 0);
        b.add('i' as u32, 1);
        b.set_length(2);
        b.glyph_infos_mut()[0].cluster = 0;
        b.glyph_infos_mut()[1].cluster = 1;
        b.replace_glyphs(2, &[999]);
        b.swap_buffers();
        assert!(b.glyph_infos()[0].unsafe_to_break());
    }

    #[test]
    fn merge_clusters_monotone_extends() {
        let mut b = Buffer::new();
        for i in 0..4u32 {
            b.add(i, i);
        }
        b.set_cluster_level(ClusterLevel::MonotoneGraphemes);
        // collapse clusters 1..3 down to cluster 1; since cluster_level is
        // monotone and there's no adjacent equal-cluster run, lo/hi stay put.
        b.merge_clusters(1, 3);
        let clusters: Vec<u32> = b.glyph_infos().iter().map(|g| g.cluster).collect();
        assert_eq!(clusters, vec![0, 1, 1, 3]);
    }

    #[test]
    fn merge_clusters_sets_unsafe_to_break_when_spanning_clusters() {
        let mut b = Buffer::new();
        for i in 0..4u32 {
            b.add(i, i);
        }
        b.set_cluster_level(ClusterLevel::Characters);
        b.merge_clusters(1, 3);
        assert!(b.glyph_infos()[1].unsafe_to_break());
        assert!(b.glyph_infos()[2].unsafe_to_break());
        assert!(!b.glyph_infos()[0].unsafe_to_break());
        assert!(!b.glyph_infos()[3].unsafe_to_break());
    }

    #[test]
    fn unsafe_to_break_propagates_over_cluster() {
        let mut b = Buffer::new();
        b.add(0, 0);
        b.add(0, 0);
        b.add(0, 1);
        b.unsafe_to_break(0, 1);
        assert!(b.glyph_infos()[0].unsafe_to_break());
        assert!(b.glyph_infos()[1].unsafe_to_break());
        assert!(!b.glyph_infos()[2].unsafe_to_break());
    }

    #[test]
    fn reverse_clusters_keeps_cluster_values() {
        let mut b = Buffer::new();
        b.add(10, 0);
        b.add(11, 0);
        b.add(12, 1);
        b.reverse_clusters();
        let cps: Vec<u32> = b.glyph_infos().iter().map(|g| g.codepoint).collect();
        let clusters: Vec<u32> = b.glyph_infos().iter().map(|g| g.cluster).collect();
        assert_eq!(cps, vec![11, 10, 12]);
        assert_eq!(clusters, vec![0, 0, 1]);
    }
}
