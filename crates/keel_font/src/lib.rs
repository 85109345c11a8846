//! TrueType font parsing and sdf glyph atlas generation for the keel engine.

pub mod fonttex;
pub mod ttf;

mod font;

pub use font::{Font, FontCodepoint, FontGlyph, FontSegment, SegmentKind};
pub use fonttex::{
    FONTTEX_GLYPH_NONE, FontTex, FontTexBinLoader, FontTexBundle, FontTexChar, FontTexDef,
    FontTexDefFont, FontTexError, FontTexLoader,
};
pub use ttf::{TtfError, TtfLoader};
