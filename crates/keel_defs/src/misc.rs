//! Smaller declarative definitions: decals, terrain, graphics, levels and
//! vfx systems. These share the map loaders' pattern (json definition,
//! reference binding, caching where a binary form exists) while their deep
//! domain transforms live with the systems that consume them.

use serde::Deserialize;

use keel_asset::{
    AssetBlob, AssetLoader, BlobCodec, BlobReader, BlobWriter, CacheError, Load, LoadContext,
    LoadError, id_hash, read_blob,
};
use thiserror::Error;

use crate::refs::AssetRef;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefError {
    #[error("definition specifies an invalid asset reference")]
    InvalidAssetReference,
}

fn resolve(ctx: &mut LoadContext, id: &str) -> Result<AssetRef, DefError> {
    AssetRef::resolve(ctx, id).ok_or(DefError::InvalidAssetReference)
}

// -- Decal ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecalDef {
    pub atlas_entry: String,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub thickness: f32,
    #[serde(default)]
    pub alpha: f32,
    #[serde(default)]
    pub fade_out_time: f32,
}

/// A projected decal description; the atlas entry is referenced by hash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decal {
    pub atlas_entry: u32,
    pub width: f32,
    pub height: f32,
    pub thickness: f32,
    pub alpha: f32,
    pub fade_out_time: f32,
}

pub struct DecalLoader;

impl AssetLoader for DecalLoader {
    fn load(&self, _ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: DecalDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        Ok(Load::Done(Box::new(Decal {
            atlas_entry: id_hash(&def.atlas_entry),
            width: def.width,
            height: def.height,
            thickness: def.thickness,
            alpha: if def.alpha > 0.0 { def.alpha } else { 1.0 },
            fade_out_time: def.fade_out_time,
        })))
    }
}

// -- Terrain ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TerrainDef {
    pub graphic: String,
    pub heightmap: String,
    pub size: u32,
    pub play_size: u32,
    pub height_scale: f32,
}

/// A terrain descriptor with its graphic and heightmap references bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Terrain {
    pub graphic: AssetRef,
    pub heightmap: AssetRef,
    pub size: u32,
    pub play_size: u32,
    pub height_scale: f32,
}

pub struct TerrainLoader;

impl AssetLoader for TerrainLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: TerrainDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        let terrain = Terrain {
            graphic: resolve(ctx, &def.graphic).map_err(LoadError::loader)?,
            heightmap: resolve(ctx, &def.heightmap).map_err(LoadError::loader)?,
            size: def.size,
            play_size: def.play_size.min(def.size),
            height_scale: def.height_scale,
        };
        Ok(Load::Done(Box::new(terrain)))
    }
}

// -- Graphic ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplerWrap {
    Clamp,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplerFilter {
    Linear,
    Nearest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphicSamplerDef {
    pub texture: String,
    #[serde(default = "default_wrap")]
    pub wrap: SamplerWrap,
    #[serde(default = "default_filter")]
    pub filter: SamplerFilter,
}

fn default_wrap() -> SamplerWrap {
    SamplerWrap::Repeat
}

fn default_filter() -> SamplerFilter {
    SamplerFilter::Linear
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphicDef {
    pub shaders: Vec<String>,
    #[serde(default)]
    pub samplers: Vec<GraphicSamplerDef>,
    #[serde(default)]
    pub mesh: Option<String>,
    #[serde(default)]
    pub depth_test: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicSampler {
    pub texture: AssetRef,
    pub wrap: SamplerWrap,
    pub filter: SamplerFilter,
}

/// A render graphic descriptor: shader, sampler and mesh references bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Graphic {
    pub shaders: Vec<AssetRef>,
    pub samplers: Vec<GraphicSampler>,
    pub mesh: Option<AssetRef>,
    pub depth_test: bool,
}

pub struct GraphicLoader;

impl AssetLoader for GraphicLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: GraphicDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        let shaders = def
            .shaders
            .iter()
            .map(|id| resolve(ctx, id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(LoadError::loader)?;
        let samplers = def
            .samplers
            .iter()
            .map(|sampler| {
                Ok(GraphicSampler {
                    texture: resolve(ctx, &sampler.texture)?,
                    wrap: sampler.wrap,
                    filter: sampler.filter,
                })
            })
            .collect::<Result<Vec<_>, DefError>>()
            .map_err(LoadError::loader)?;
        let mesh = match &def.mesh {
            Some(id) => Some(resolve(ctx, id).map_err(LoadError::loader)?),
            None => None,
        };
        Ok(Load::Done(Box::new(Graphic {
            shaders,
            samplers,
            mesh,
            depth_test: def.depth_test,
        })))
    }
}

// -- Level ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LevelObjectDef {
    pub prefab: String,
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub faction: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LevelDef {
    #[serde(default)]
    pub name: String,
    pub terrain: String,
    #[serde(default)]
    pub objects: Vec<LevelObjectDef>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelObject {
    /// Prefab name hash, resolved against the active prefab map on spawn.
    pub prefab: u32,
    pub position: [f32; 3],
    pub rotation: f32,
    pub faction: u8,
}

/// A level description: the terrain reference plus the object placements.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub name: String,
    pub terrain: AssetRef,
    pub objects: Vec<LevelObject>,
}

impl Level {
    fn rebind_refs(&mut self, ctx: &mut LoadContext) {
        self.terrain.rebind(ctx);
    }
}

impl BlobCodec for Level {
    const TYPE_NAME: &'static str = "Level";
    const LAYOUT: &'static str = "Level{name:str,terrain:ref,objects:[{prefab:u32,\
         position:[f32;3],rotation:f32,faction:u8}]}";

    fn encode(&self, w: &mut BlobWriter) {
        w.string(&self.name);
        self.terrain.encode(w);
        w.array(&self.objects, |w, object| {
            w.u32(object.prefab);
            w.f32(object.position[0]);
            w.f32(object.position[1]);
            w.f32(object.position[2]);
            w.f32(object.rotation);
            w.u8(object.faction);
        });
    }

    fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        Ok(Self {
            name: r.string()?,
            terrain: AssetRef::decode(r)?,
            objects: r.array(|r| {
                Ok(LevelObject {
                    prefab: r.u32()?,
                    position: [r.f32()?, r.f32()?, r.f32()?],
                    rotation: r.f32()?,
                    faction: r.u8()?,
                })
            })?,
        })
    }
}

pub struct LevelLoader;

impl AssetLoader for LevelLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: LevelDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        let level = Level {
            name: def.name,
            terrain: resolve(ctx, &def.terrain).map_err(LoadError::loader)?,
            objects: def
                .objects
                .iter()
                .map(|object| LevelObject {
                    prefab: id_hash(&object.prefab),
                    position: object.position,
                    rotation: object.rotation,
                    faction: object.faction,
                })
                .collect(),
        };
        ctx.cache(&level);
        Ok(Load::Done(Box::new(level)))
    }
}

pub struct LevelBinLoader;

impl AssetLoader for LevelBinLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let mut level: Level = read_blob(&blob.data)?;
        level.rebind_refs(ctx);
        Ok(Load::Done(Box::new(level)))
    }
}

// -- Vfx --------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VfxEmitterDef {
    pub atlas_entry: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub interval: f32,
    #[serde(default)]
    pub lifetime: f32,
    #[serde(default)]
    pub speed: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VfxDef {
    pub atlas: String,
    pub emitters: Vec<VfxEmitterDef>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VfxEmitter {
    pub atlas_entry: u32,
    pub count: u32,
    pub interval: f32,
    pub lifetime: f32,
    pub speed: f32,
}

/// A particle system description with its atlas reference bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Vfx {
    pub atlas: AssetRef,
    pub emitters: Vec<VfxEmitter>,
}

pub struct VfxLoader;

impl AssetLoader for VfxLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: VfxDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        Ok(Load::Done(Box::new(Vfx {
            atlas: resolve(ctx, &def.atlas).map_err(LoadError::loader)?,
            emitters: def
                .emitters
                .iter()
                .map(|emitter| VfxEmitter {
                    atlas_entry: id_hash(&emitter.atlas_entry),
                    count: emitter.count.max(1),
                    interval: emitter.interval,
                    lifetime: emitter.lifetime,
                    speed: emitter.speed,
                })
                .collect(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_asset::{AssetFormat, AssetManager, AssetManagerFlags, MemoryAssetIo};

    fn manager_with(records: Vec<(&'static str, &'static [u8])>) -> AssetManager {
        let mut manager =
            AssetManager::new(MemoryAssetIo::from_records(records), AssetManagerFlags::empty());
        manager.register_loader(AssetFormat::Decal, DecalLoader);
        manager.register_loader(AssetFormat::Terrain, TerrainLoader);
        manager.register_loader(AssetFormat::Graphic, GraphicLoader);
        manager.register_loader(AssetFormat::Level, LevelLoader);
        manager.register_loader(AssetFormat::Vfx, VfxLoader);
        manager
    }

    #[test]
    fn decal_definitions_load() {
        let mut manager = manager_with(vec![(
            "fx/scorch.decal",
            br#"{"atlasEntry": "scorch", "width": 2, "height": 2, "alpha": 0.8}"#,
        )]);
        let asset = manager.lookup("fx/scorch.decal");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        let decal = manager.get::<Decal>(asset).unwrap();
        assert_eq!(decal.atlas_entry, id_hash("scorch"));
        assert!((decal.alpha - 0.8).abs() < 1.0e-6);
    }

    #[test]
    fn terrain_definitions_bind_references() {
        let mut manager = manager_with(vec![(
            "maps/swamp.terrain",
            br#"{"graphic": "graphics/terrain.graphic", "heightmap": "maps/swamp.r16",
                 "size": 512, "playSize": 400, "heightScale": 50}"#,
        )]);
        let asset = manager.lookup("maps/swamp.terrain");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        let terrain = manager.get::<Terrain>(asset).unwrap();
        let heightmap = terrain.heightmap.entity;
        assert!(heightmap.is_valid());
        assert_eq!(manager.lookup("maps/swamp.r16"), heightmap);
    }

    #[test]
    fn graphic_definitions_bind_shader_and_sampler_refs() {
        let mut manager = manager_with(vec![(
            "graphics/tree.graphic",
            br#"{"shaders": ["shaders/geo.vert", "shaders/geo.frag"],
                 "samplers": [{"texture": "textures/tree.tga", "filter": "nearest"}],
                 "mesh": "meshes/tree.gltf", "depthTest": true}"#,
        )]);
        let asset = manager.lookup("graphics/tree.graphic");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        let graphic = manager.get::<Graphic>(asset).unwrap();
        assert_eq!(graphic.shaders.len(), 2);
        assert_eq!(graphic.samplers[0].filter, SamplerFilter::Nearest);
        assert_eq!(graphic.samplers[0].wrap, SamplerWrap::Repeat);
        assert!(graphic.mesh.is_some());
        assert!(graphic.depth_test);
    }

    #[test]
    fn level_definitions_load_and_round_trip() {
        let mut manager = manager_with(vec![(
            "maps/swamp.level",
            br#"{"name": "Swamp", "terrain": "maps/swamp.terrain",
                 "objects": [
                     {"prefab": "swamp-tree", "position": [1, 0, 2]},
                     {"prefab": "grunt", "position": [4, 0, 4], "rotation": 1.5, "faction": 2}
                 ]}"#,
        )]);
        let asset = manager.lookup("maps/swamp.level");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        let level = manager.get::<Level>(asset).unwrap();
        assert_eq!(level.objects.len(), 2);
        assert_eq!(level.objects[0].prefab, id_hash("swamp-tree"));
        assert_eq!(level.objects[1].faction, 2);

        let blob = keel_asset::write_blob(level);
        let decoded: Level = keel_asset::read_blob(&blob).unwrap();
        assert_eq!(decoded.name, "Swamp");
        assert_eq!(decoded.objects, level.objects);
    }

    #[test]
    fn vfx_definitions_load() {
        let mut manager = manager_with(vec![(
            "vfx/muzzle.vfx",
            br#"{"atlas": "textures/particles.atlas",
                 "emitters": [{"atlasEntry": "flash", "lifetime": 0.2, "speed": 3}]}"#,
        )]);
        let asset = manager.lookup("vfx/muzzle.vfx");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        let vfx = manager.get::<Vfx>(asset).unwrap();
        assert_eq!(vfx.emitters.len(), 1);
        assert_eq!(vfx.emitters[0].count, 1); // Count clamps to at least one.
        assert_eq!(vfx.emitters[0].atlas_entry, id_hash("flash"));
    }

    #[test]
    fn missing_references_fail_the_load() {
        let mut manager = manager_with(vec![(
            "maps/broken.terrain",
            br#"{"graphic": "", "heightmap": "maps/h.r16", "size": 8, "playSize": 8,
                 "heightScale": 1}"#,
        )]);
        let asset = manager.lookup("maps/broken.terrain");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        assert!(manager.is_failed(asset));
    }
}
