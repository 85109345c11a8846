//! Asset pipeline and content manager for the keel engine.
//!
//! keel turns on-disk sources (TrueType fonts, tga / ppm images, json
//! definitions, raw float grids) into runtime values (glyph outlines, sdf
//! texture atlases, pixel buffers, prefab / weapon / input tables) and
//! mediates their lifecycle: reference counting, multi-frame loading,
//! hot-reload with dependency propagation, and a persistent binary cache.
//!
//! ```no_run
//! use keel::{AssetManager, AssetManagerFlags, FileAssetIo, RawAsset};
//!
//! let io = FileAssetIo::new("assets");
//! let mut manager = AssetManager::new(io, AssetManagerFlags::DELAY_UNLOAD);
//! keel::register_default_loaders(&mut manager);
//!
//! let asset = manager.lookup("data/readme.raw");
//! manager.acquire(asset);
//! loop {
//!     manager.tick();
//!     if manager.is_loaded(asset) {
//!         let raw = manager.get::<RawAsset>(asset).unwrap();
//!         println!("{} bytes", raw.data.len());
//!         break;
//!     }
//!     if manager.is_failed(asset) {
//!         break;
//!     }
//! }
//! ```

pub use keel_asset::*;
pub use keel_defs::*;
pub use keel_font::{
    Font, FontCodepoint, FontGlyph, FontSegment, FontTex, FontTexBinLoader, FontTexBundle,
    FontTexChar, FontTexError, FontTexLoader, SegmentKind, TtfError, TtfLoader,
};
pub use keel_image::{
    Color, HeightLoader, PngLoader, PpmLoader, TexBinLoader, Texture, TextureFlags, TextureFormat,
    TextureType, TgaLoader, bc1, is_normalmap,
};

/// Register the default loader for every format that has one. Formats
/// without a loader (meshes, shaders, sounds) fail their loads with an
/// unsupported-format error until one is registered.
pub fn register_default_loaders(manager: &mut AssetManager) {
    manager.register_loader(AssetFormat::Raw, RawLoader);

    manager.register_loader(AssetFormat::FontTtf, TtfLoader);
    manager.register_loader(AssetFormat::TexFont, FontTexLoader);
    manager.register_loader(AssetFormat::TexFontBin, FontTexBinLoader);

    manager.register_loader(AssetFormat::TexTga, TgaLoader);
    manager.register_loader(AssetFormat::TexPpm, PpmLoader);
    manager.register_loader(AssetFormat::TexPng, PngLoader);
    manager.register_loader(AssetFormat::TexHeight16, HeightLoader::r16());
    manager.register_loader(AssetFormat::TexHeight32, HeightLoader::r32());
    manager.register_loader(AssetFormat::TexBin, TexBinLoader);

    manager.register_loader(AssetFormat::Prefabs, PrefabsLoader);
    manager.register_loader(AssetFormat::PrefabsBin, PrefabsBinLoader);
    manager.register_loader(AssetFormat::Weapons, WeaponsLoader);
    manager.register_loader(AssetFormat::WeaponsBin, WeaponsBinLoader);
    manager.register_loader(AssetFormat::Products, ProductsLoader);
    manager.register_loader(AssetFormat::ProductsBin, ProductsBinLoader);
    manager.register_loader(AssetFormat::Inputs, InputsLoader);
    manager.register_loader(AssetFormat::InputsBin, InputsBinLoader);

    manager.register_loader(AssetFormat::Decal, DecalLoader);
    manager.register_loader(AssetFormat::Terrain, TerrainLoader);
    manager.register_loader(AssetFormat::Graphic, GraphicLoader);
    manager.register_loader(AssetFormat::Level, LevelLoader);
    manager.register_loader(AssetFormat::LevelBin, LevelBinLoader);
    manager.register_loader(AssetFormat::Vfx, VfxLoader);
}
