//! Texture formats, block compression and image decoding for the keel
//! engine.
//!
//! Every decoder funnels into [`Texture::create`], which normalizes channel
//! counts, detects translucency and owns the canonical pixel layout that the
//! rest of the engine samples from.

pub mod bc1;
pub mod height;
pub mod png;
pub mod ppm;
pub mod tga;

mod loaders;
mod texture;

pub use loaders::{HeightLoader, PngLoader, PpmLoader, TexBinLoader, TgaLoader};
pub use texture::{
    Color, SRGB_TO_FLOAT, Texture, TextureFlags, TextureFormat, TextureType, is_normalmap,
    mip_pixel_count, pixel_count,
};
