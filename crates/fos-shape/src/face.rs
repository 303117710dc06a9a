//! Face (external, §6): the read-only font object the rest of the core
//! consumes. Spec treats this as an interface only ("Font table access...
//! consumed as a read-only face object"); SPEC_FULL.md's Ambient stack
//! section calls for one concrete implementation so the crate is testable
//! end to end, the way `rustybuzz` itself is tested against a
//! `ttf-parser`-backed face. `OtfFace` is a thin adapter over
//! `ttf_parser::Face` — the teacher's own from-scratch `font/parser/
//! {cmap,glyf,outline}.rs` duplicate what `ttf-parser` already does and are
//! not reused here (see DESIGN.md).

use crate::error::{Result, ShapeError};
use crate::glyph::GlyphId;

/// Glyph extents in font units (spec §6: `get_glyph_extents`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphExtents {
    pub x_bearing: i32,
    pub y_bearing: i32,
    pub width: i32,
    pub height: i32,
}

/// The read-only font interface the shaping core consumes (spec §6).
///
/// Implementations only need to answer queries; nothing here is mutable,
/// matching spec §5's "Face... immutable after construction and safe to
/// share read-only across threads".
pub trait Face {
    fn has_table(&self, tag: [u8; 4]) -> bool;
    fn get_table(&self, tag: [u8; 4]) -> Option<&[u8]>;

    fn get_glyph(&self, codepoint: u32, variation_selector: u32) -> Option<GlyphId>;
    fn get_advance_h(&self, glyph: GlyphId) -> i32;
    fn get_advance_v(&self, glyph: GlyphId) -> i32;
    fn get_side_bearing_h(&self, glyph: GlyphId) -> i32;
    fn get_side_bearing_v(&self, glyph: GlyphId) -> i32;
    fn get_glyph_extents(&self, glyph: GlyphId) -> Option<GlyphExtents>;
    fn get_contour_point(&self, glyph: GlyphId, point_index: u16) -> Option<(i32, i32)>;

    fn units_per_em(&self) -> u16;
}

/// `Face` over `ttf_parser::Face` (spec §6, SPEC_FULL.md Ambient stack).
pub struct OtfFace<'a> {
    inner: ttf_parser::Face<'a>,
}

impl<'a> OtfFace<'a> {
    pub fn new(data: &'a [u8], index: u32) -> Result<Self> {
        let inner = ttf_parser::Face::parse(data, index)
            .map_err(|_| ShapeError::InvalidFont("could not parse font data"))?;
        Ok(Self { inner })
    }
}

impl<'a> Face for OtfFace<'a> {
    fn has_table(&self, tag: [u8; 4]) -> bool {
        self.inner.raw_face().table(ttf_parser::Tag::from_bytes(&tag)).is_some()
    }

    fn get_table(&self, tag: [u8; 4]) -> Option<&[u8]> {
        self.inner.raw_face().table(ttf_parser::Tag::from_bytes(&tag))
    }

    fn get_glyph(&self, codepoint: u32, variation_selector: u32) -> Option<GlyphId> {
        let c = char::from_u32(codepoint)?;
        if variation_selector != 0 {
            if let Some(vs) = char::from_u32(variation_selector) {
                if let Some(g) = self.inner.glyph_variation_index(c, vs) {
                    return Some(GlyphId(g.0));
                }
            }
        }
        self.inner.glyph_index(c).map(|g| GlyphId(g.0))
    }

    fn get_advance_h(&self, glyph: GlyphId) -> i32 {
        self.inner.glyph_hor_advance(ttf_parser::GlyphId(glyph.0)).unwrap_or(0) as i32
    }

    fn get_advance_v(&self, glyph: GlyphId) -> i32 {
        self.inner.glyph_ver_advance(ttf_parser::GlyphId(glyph.0)).unwrap_or(0) as i32
    }

    fn get_side_bearing_h(&self, glyph: GlyphId) -> i32 {
        self.inner.glyph_hor_side_bearing(ttf_parser::GlyphId(glyph.0)).unwrap_or(0) as i32
    }

    fn get_side_bearing_v(&self, glyph: GlyphId) -> i32 {
        self.inner.glyph_ver_side_bearing(ttf_parser::GlyphId(glyph.0)).unwrap_or(0) as i32
    }

    fn get_glyph_extents(&self, glyph: GlyphId) -> Option<GlyphExtents> {
        let bbox = self.inner.glyph_bounding_box(ttf_parser::GlyphId(glyph.0))?;
        Some(GlyphExtents {
            x_bearing: bbox.x_min as i32,
            y_bearing: bbox.y_max as i32,
            width: (bbox.x_max - bbox.x_min) as i32,
            height: (bbox.y_min - bbox.y_max) as i32,
        })
    }

    fn get_contour_point(&self, glyph: GlyphId, point_index: u16) -> Option<(i32, i32)> {
        let mut collector = PointCollector { points: Vec::new() };
        self.inner.outline_glyph(ttf_parser::GlyphId(glyph.0), &mut collector)?;
        collector.points.get(point_index as usize).map(|&(x, y)| (x as i32, y as i32))
    }

    fn units_per_em(&self) -> u16 {
        self.inner.units_per_em()
    }
}

/// Collects on-curve contour points in emission order, the ordering
/// `get_contour_point`'s index addresses (spec §6).
struct PointCollector {
    points: Vec<(f32, f32)>,
}

impl ttf_parser::OutlineBuilder for PointCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        self.points.push((x, y));
    }
    fn line_to(&mut self, x: f32, y: f32) {
        self.points.push((x, y));
    }
    fn quad_to(&mut self, _x1: f32, _y1: f32, x: f32, y: f32) {
        self.points.push((x, y));
    }
    fn curve_to(&mut self, _x1: f32, _y1: f32, _x2: f32, _y2: f32, x: f32, y: f32) {
        self.points.push((x, y));
    }
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_font_data_rejected() {
        let data = [0u8; 4];
        assert!(OtfFace::new(&data, 0).is_err());
    }
}
