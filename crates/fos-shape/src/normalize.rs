//! Normalizer (C5, spec §4.3 step 2).
//!
//! Converts input code points to a shape-friendly form while the buffer
//! still holds Unicode content (cluster tracking is preserved throughout:
//! every mutator here goes through [`Buffer`]'s pass primitives, so cluster
//! minimality and `UNSAFE_TO_BREAK` propagation fall out for free).

use crate::buffer::Buffer;
use crate::unicode::{combining_class, compose_pair, decompose_pair, is_mark};

/// Decomposition policy a complex shaper selects (spec §4.3 step 2, §9
/// capability set: `normalization_preference`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationPreference {
    None,
    Decomposed,
    ComposedDiacritics,
    ComposedDiacriticsNoShortCircuit,
}

/// U+25CC DOTTED CIRCLE, inserted before a mark with no preceding base so
/// a font always has something to attach the mark's glyph to (spec §4.3
/// step 2, §3 flag `DO_NOT_INSERT_DOTTED_CIRCLE`).
pub const DOTTED_CIRCLE: u32 = 0x25CC;

/// Run the full normalize pass (spec §4.3 step 2). `buffer.content_type()`
/// must still be `Unicode`; `codepoint` fields hold Unicode scalars.
pub fn normalize(buffer: &mut Buffer, preference: NormalizationPreference, insert_dotted_circle: bool) {
    if preference != NormalizationPreference::None {
        decompose_pass(buffer);
    }
    reorder_marks(buffer);
    match preference {
        NormalizationPreference::ComposedDiacritics => compose_pass(buffer, false),
        NormalizationPreference::ComposedDiacriticsNoShortCircuit => compose_pass(buffer, true),
        _ => {}
    }
    if insert_dotted_circle {
        insert_dotted_circles(buffer);
    }
}

/// Canonically decompose every codepoint with a 2-element canonical
/// decomposition (spec §6: `canonical-decompose(cp) -> (a,b)?`). Each
/// decomposed pair keeps the originating cluster via `replace_glyphs`,
/// preserving cluster minimality automatically.
fn decompose_pass(buffer: &mut Buffer) {
    buffer.set_idx(0);
    loop {
        if buffer.idx() >= buffer.len() {
            break;
        }
        let cp = buffer.glyph_infos()[buffer.idx()].codepoint;
        match char::from_u32(cp).and_then(decompose_pair) {
            Some((a, b)) => buffer.replace_glyphs(1, &[a as u32, b as u32]),
            None => buffer.next_glyph(),
        }
    }
    buffer.swap_buffers();
}

/// Stable-sort maximal runs of combining marks by canonical combining
/// class (spec §4.3 step 2: "canonical-reorder marks by combining class
/// using stable sort").
fn reorder_marks(buffer: &mut Buffer) {
    let len = buffer.len();
    let mut i = 0;
    while i < len {
        let c = char::from_u32(buffer.glyph_infos()[i].codepoint).unwrap_or('\0');
        if !is_mark(c) || combining_class(c) == 0 {
            i += 1;
            continue;
        }
        let mut end = i;
        while end < len {
            let c = char::from_u32(buffer.glyph_infos()[end].codepoint).unwrap_or('\0');
            if is_mark(c) && combining_class(c) != 0 {
                end += 1;
            } else {
                break;
            }
        }
        if end - i > 1 {
            buffer.sort(i, end, |a, b| {
                let ca = char::from_u32(a.codepoint).map(combining_class).unwrap_or(0);
                let cb = char::from_u32(b.codepoint).map(combining_class).unwrap_or(0);
                ca.cmp(&cb)
            });
        }
        i = end;
    }
}

/// Recompose adjacent (base, mark) pairs (spec §6: `canonical-compose(a,b)
/// -> ab?`). `no_short_circuit` mirrors the shaper's
/// `COMPOSED_DIACRITICS_NO_SHORT_CIRCUIT` preference: the default
/// `ComposedDiacritics` preference refuses to compose a base+mark pair
/// that is itself followed by another combining mark, since recomposing
/// only the first of a multi-mark stack can produce a glyph the font
/// never intended as an attachment target.
fn compose_pass(buffer: &mut Buffer, no_short_circuit: bool) {
    buffer.set_idx(0);
    loop {
        let idx = buffer.idx();
        if idx >= buffer.len() {
            break;
        }
        if idx + 1 >= buffer.len() {
            buffer.next_glyph();
            continue;
        }
        let a = char::from_u32(buffer.glyph_infos()[idx].codepoint);
        let b = char::from_u32(buffer.glyph_infos()[idx + 1].codepoint);
        let composed = match (a, b) {
            (Some(a), Some(b)) => compose_pair(a, b),
            _ => None,
        };
        match composed {
            Some(ab) => {
                let has_trailing_mark = buffer
                    .glyph_infos()
                    .get(idx + 2)
                    .and_then(|g| char::from_u32(g.codepoint))
                    .map(|c| is_mark(c) && combining_class(c) != 0)
                    .unwrap_or(false);
                if !no_short_circuit && has_trailing_mark {
                    buffer.next_glyph();
                } else {
                    buffer.replace_glyphs(2, &[ab as u32]);
                }
            }
            None => buffer.next_glyph(),
        }
    }
    buffer.swap_buffers();
}

/// Insert U+25CC before a mark with no preceding base glyph (spec §4.3
/// step 2). Uses `output_glyph`/`next_glyph` (emit-without-consuming plus
/// consume-and-copy), the pair spec §4.1 calls out as pass mutators.
fn insert_dotted_circles(buffer: &mut Buffer) {
    buffer.set_idx(0);
    let mut prev_is_base = false;
    loop {
        let idx = buffer.idx();
        if idx >= buffer.len() {
            break;
        }
        let info = buffer.glyph_infos()[idx];
        let c = char::from_u32(info.codepoint).unwrap_or('\0');
        if is_mark(c) && !prev_is_base {
            buffer.output_glyph(DOTTED_CIRCLE, info.cluster);
        }
        prev_is_base = !is_mark(c);
        buffer.next_glyph();
    }
    buffer.swap_buffers();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_precomposed_e_acute() {
        let mut b = Buffer::new();
        b.add('\u{00E9}' as u32, 0); // é
        decompose_pass(&mut b);
        let cps: Vec<u32> = b.glyph_infos().iter().map(|g| g.codepoint).collect();
        assert_eq!(cps, vec!['e' as u32, '\u{0301}' as u32]);
        assert_eq!(b.glyph_infos()[0].cluster, 0);
        assert_eq!(b.glyph_infos()[1].cluster, 0);
    }

    #[test]
    fn reorders_marks_by_combining_class() {
        let mut b = Buffer::new();
        b.add('a' as u32, 0);
        b.add('\u{0327}' as u32, 0); // combining cedilla, ccc 202
        b.add('\u{0301}' as u32, 0); // combining acute, ccc 230
        reorder_marks(&mut b);
        let cps: Vec<u32> = b.glyph_infos().iter().map(|g| g.codepoint).collect();
        assert_eq!(cps, vec!['a' as u32, '\u{0327}' as u32, '\u{0301}' as u32]);
    }

    #[test]
    fn inserts_dotted_circle_for_leading_mark() {
        let mut b = Buffer::new();
        b.add('\u{0301}' as u32, 0);
        insert_dotted_circles(&mut b);
        let cps: Vec<u32> = b.glyph_infos().iter().map(|g| g.codepoint).collect();
        assert_eq!(cps, vec![DOTTED_CIRCLE, '\u{0301}' as u32]);
    }

    #[test]
    fn no_dotted_circle_after_base() {
        let mut b = Buffer::new();
        b.add('a' as u32, 0);
        b.add('\u{0301}' as u32, 1);
        insert_dotted_circles(&mut b);
        let cps: Vec<u32> = b.glyph_infos().iter().map(|g| g.codepoint).collect();
        assert_eq!(cps, vec!['a' as u32, '\u{0301}' as u32]);
    }

    #[test]
    fn composes_back_with_short_circuit() {
        let mut b = Buffer::new();
        b.add('e' as u32, 0);
        b.add('\u{0301}' as u32, 0);
        compose_pass(&mut b, false);
        let cps: Vec<u32> = b.glyph_infos().iter().map(|g| g.codepoint).collect();
        assert_eq!(cps, vec!['\u{00E9}' as u32]);
    }
}
