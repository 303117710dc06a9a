//! Complex-script text shaping core: OpenType GSUB/GPOS application,
//! Unicode normalization, and per-script complex shaping (Arabic, the
//! Indic family, Khmer, Myanmar, Thai, Tibetan, Hebrew, Hangul, and a
//! universal-shaping-engine fallback) over a font's glyph tables.
//!
//! The public surface is deliberately small: build a [`Buffer`] from
//! text, resolve its [`SegmentProperties`], compile a [`Plan`] for a
//! [`Face`] and those properties, then call [`shape`]. Everything else —
//! table parsing, the per-script shapers, the normalizer — is plumbing
//! the driver wires together; line breaking, paragraph layout, bidi
//! resolution, rendering, and glyph rasterization live outside this
//! crate, the way they lived in sibling crates next to this one's
//! source of origin.

mod buffer;
mod driver;
mod error;
mod face;
mod gdef;
mod glyph;
mod gpos;
mod gsub;
mod kern;
mod normalize;
mod opentype;
mod plan;
mod reader;
mod segment;
mod shapers;
mod unicode;

pub use buffer::{Buffer, BufferFlags, ClusterLevel, ContentType, GlyphInfo, GlyphPosition, UNSAFE_TO_BREAK};
pub use driver::shape;
pub use error::{Result, ShapeError};
pub use face::{Face, GlyphExtents, OtfFace};
pub use glyph::GlyphId;
pub use normalize::NormalizationPreference;
pub use opentype::Tag;
pub use plan::{compile, FeatureMap, FeatureRecord, LookupEntry, Plan, PlanBuilder, PlanFlags, RangedMask};
pub use segment::{Direction, Language, SegmentProperties};
pub use shapers::ZeroMarksPolicy;
pub use unicode::{CategoryGroup, Script};
