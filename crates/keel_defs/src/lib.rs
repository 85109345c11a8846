//! Declarative game data maps for the keel engine.
//!
//! These assets are authored as json definitions and transformed at load
//! time into packed, name-hash sorted tables with asset references bound to
//! handles. Successful json loads queue a binary cache blob; the `*Bin`
//! loaders consume those blobs and skip the json path entirely.

mod inputs;
mod misc;
mod prefab;
mod product;
mod refs;
mod weapon;

pub use inputs::{
    ActionDef, BindingDef, BindingType, InputAction, InputBinding, InputMap, InputMapDef,
    InputMapError, InputsBinLoader, InputsLoader, build_input_map,
};
pub use misc::{
    Decal, DecalDef, DecalLoader, DefError, Graphic, GraphicDef, GraphicLoader, GraphicSampler,
    GraphicSamplerDef, Level, LevelBinLoader, LevelDef, LevelLoader, LevelObject, LevelObjectDef,
    SamplerFilter, SamplerWrap, Terrain, TerrainDef, TerrainLoader, Vfx, VfxDef, VfxEmitter,
    VfxEmitterDef, VfxLoader,
};
pub use prefab::{
    Prefab, PrefabDef, PrefabError, PrefabFlags, PrefabMap, PrefabMapDef, PrefabTrait,
    PrefabTraitDef, PrefabValue, PrefabValueDef, PrefabsBinLoader, PrefabsLoader,
    build_prefab_map,
};
pub use product::{
    Product, ProductDef, ProductError, ProductMap, ProductMapDef, ProductSet, ProductSetDef,
    ProductsBinLoader, ProductsLoader, build_product_map,
};
pub use refs::AssetRef;
pub use weapon::{
    Weapon, WeaponDef, WeaponEffect, WeaponEffectDef, WeaponError, WeaponMap, WeaponMapDef,
    WeaponsBinLoader, WeaponsLoader, build_weapon_map,
};
