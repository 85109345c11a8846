//! Prefab map: a declarative catalog of spawnable entity archetypes, each a
//! named bundle of traits.
//!
//! The source definition is a flat array of prefabs; the runtime form packs
//! it into three parallel tables (prefabs sorted on the name hash, traits
//! packed per prefab, knowledge values packed per trait) for binary-search
//! lookups without pointer chasing.

use bitflags::bitflags;
use serde::Deserialize;
use thiserror::Error;

use keel_asset::{
    AssetBlob, AssetLoader, BlobCodec, BlobReader, BlobWriter, CacheError, Load, LoadContext,
    LoadError, id_hash, read_blob,
};

use crate::refs::AssetRef;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefabError {
    #[error("multiple prefabs with the same name")]
    DuplicatePrefab,
    #[error("prefab contains the same trait more than once")]
    DuplicateTrait,
    #[error("prefab count exceeds the maximum")]
    PrefabCountExceedsMax,
    #[error("prefab specifies an invalid asset reference")]
    InvalidAssetReference,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrefabFlags: u8 {
        /// Not persisted in level saves.
        const VOLATILE = 1 << 0;
        const INFANTRY = 1 << 1;
        const VEHICLE = 1 << 2;
        const STRUCTURE = 1 << 3;
        const DESTRUCTIBLE = 1 << 4;
    }
}

/// Set memberships that also imply a prefab flag.
const SET_FLAGS: &[(&str, PrefabFlags)] = &[
    ("infantry", PrefabFlags::INFANTRY),
    ("vehicle", PrefabFlags::VEHICLE),
    ("structure", PrefabFlags::STRUCTURE),
    ("destructible", PrefabFlags::DESTRUCTIBLE),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrefabValueDef {
    pub key: String,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PrefabTraitDef {
    #[serde(rename_all = "camelCase")]
    Name { name: String },
    #[serde(rename_all = "camelCase")]
    SetMember { sets: Vec<String> },
    #[serde(rename_all = "camelCase")]
    Renderable { graphic: String },
    #[serde(rename_all = "camelCase")]
    Vfx { asset: String },
    #[serde(rename_all = "camelCase")]
    Decal { asset: String },
    #[serde(rename_all = "camelCase")]
    Sound {
        assets: Vec<String>,
        #[serde(default)]
        gain: f32,
        #[serde(default)]
        pitch: f32,
    },
    #[serde(rename_all = "camelCase")]
    Lifetime { duration: f32 },
    #[serde(rename_all = "camelCase")]
    Movement {
        speed: f32,
        #[serde(default)]
        rotation_speed: f32,
        #[serde(default)]
        radius: f32,
    },
    #[serde(rename_all = "camelCase")]
    Health {
        amount: f32,
        #[serde(default)]
        death_destroy_delay: f32,
    },
    #[serde(rename_all = "camelCase")]
    Script {
        scripts: Vec<String>,
        #[serde(default)]
        knowledge: Vec<PrefabValueDef>,
    },
}

impl PrefabTraitDef {
    /// Discriminant used for duplicate-trait detection.
    fn kind(&self) -> u32 {
        match self {
            PrefabTraitDef::Name { .. } => 0,
            PrefabTraitDef::SetMember { .. } => 1,
            PrefabTraitDef::Renderable { .. } => 2,
            PrefabTraitDef::Vfx { .. } => 3,
            PrefabTraitDef::Decal { .. } => 4,
            PrefabTraitDef::Sound { .. } => 5,
            PrefabTraitDef::Lifetime { .. } => 6,
            PrefabTraitDef::Movement { .. } => 7,
            PrefabTraitDef::Health { .. } => 8,
            PrefabTraitDef::Script { .. } => 9,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrefabDef {
    pub name: String,
    #[serde(default)]
    pub is_volatile: bool,
    #[serde(default)]
    pub traits: Vec<PrefabTraitDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrefabMapDef {
    pub prefabs: Vec<PrefabDef>,
}

/// Runtime trait value with asset references bound to handles.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefabTrait {
    Name {
        name: u32,
    },
    SetMember {
        sets: Vec<u32>,
    },
    Renderable {
        graphic: AssetRef,
    },
    Vfx {
        asset: AssetRef,
    },
    Decal {
        asset: AssetRef,
    },
    Sound {
        assets: Vec<AssetRef>,
        gain: f32,
        pitch: f32,
    },
    Lifetime {
        duration: f32,
    },
    Movement {
        speed: f32,
        rotation_speed: f32,
        radius: f32,
    },
    Health {
        amount: f32,
        death_destroy_delay: f32,
    },
    Script {
        scripts: Vec<AssetRef>,
        value_index: u16,
        value_count: u16,
    },
}

/// A script knowledge value, packed per script trait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefabValue {
    pub key: u32,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prefab {
    pub name: u32,
    pub flags: PrefabFlags,
    pub trait_index: u16,
    pub trait_count: u16,
}

/// The packed runtime prefab catalog.
#[derive(Debug, PartialEq)]
pub struct PrefabMap {
    /// Sorted on the name hash.
    pub prefabs: Vec<Prefab>,
    /// Maps source-file ordering (the 'user index') to `prefabs` positions.
    pub user_index_lookup: Vec<u16>,
    pub traits: Vec<PrefabTrait>,
    pub values: Vec<PrefabValue>,
}

impl PrefabMap {
    pub fn find(&self, name_hash: u32) -> Option<&Prefab> {
        self.prefabs
            .binary_search_by_key(&name_hash, |prefab| prefab.name)
            .ok()
            .map(|index| &self.prefabs[index])
    }

    /// Find a prefab by its position in the source file.
    pub fn find_by_user_index(&self, user_index: u16) -> Option<&Prefab> {
        let index = *self.user_index_lookup.get(user_index as usize)?;
        self.prefabs.get(index as usize)
    }

    pub fn prefab_traits(&self, prefab: &Prefab) -> &[PrefabTrait] {
        let begin = prefab.trait_index as usize;
        &self.traits[begin..begin + prefab.trait_count as usize]
    }

    /// Rebind every asset reference after decoding from a cache blob.
    fn rebind_refs(&mut self, ctx: &mut LoadContext) {
        for entry in &mut self.traits {
            match entry {
                PrefabTrait::Renderable { graphic } => graphic.rebind(ctx),
                PrefabTrait::Vfx { asset } | PrefabTrait::Decal { asset } => asset.rebind(ctx),
                PrefabTrait::Sound { assets, .. } => {
                    for asset in assets {
                        asset.rebind(ctx);
                    }
                }
                PrefabTrait::Script { scripts, .. } => {
                    for script in scripts {
                        script.rebind(ctx);
                    }
                }
                _ => {}
            }
        }
    }
}

fn build_trait(
    ctx: &mut LoadContext,
    def: &PrefabTraitDef,
    values: &mut Vec<PrefabValue>,
) -> Result<PrefabTrait, PrefabError> {
    let resolve = |ctx: &mut LoadContext, id: &str| {
        AssetRef::resolve(ctx, id).ok_or(PrefabError::InvalidAssetReference)
    };
    Ok(match def {
        PrefabTraitDef::Name { name } => PrefabTrait::Name {
            name: id_hash(name),
        },
        PrefabTraitDef::SetMember { sets } => PrefabTrait::SetMember {
            sets: sets.iter().map(|set| id_hash(set)).collect(),
        },
        PrefabTraitDef::Renderable { graphic } => PrefabTrait::Renderable {
            graphic: resolve(ctx, graphic)?,
        },
        PrefabTraitDef::Vfx { asset } => PrefabTrait::Vfx {
            asset: resolve(ctx, asset)?,
        },
        PrefabTraitDef::Decal { asset } => PrefabTrait::Decal {
            asset: resolve(ctx, asset)?,
        },
        PrefabTraitDef::Sound {
            assets,
            gain,
            pitch,
        } => PrefabTrait::Sound {
            assets: assets
                .iter()
                .map(|id| resolve(ctx, id))
                .collect::<Result<_, _>>()?,
            gain: *gain,
            pitch: *pitch,
        },
        PrefabTraitDef::Lifetime { duration } => PrefabTrait::Lifetime {
            duration: *duration,
        },
        PrefabTraitDef::Movement {
            speed,
            rotation_speed,
            radius,
        } => PrefabTrait::Movement {
            speed: *speed,
            rotation_speed: *rotation_speed,
            radius: *radius,
        },
        PrefabTraitDef::Health {
            amount,
            death_destroy_delay,
        } => PrefabTrait::Health {
            amount: *amount,
            death_destroy_delay: *death_destroy_delay,
        },
        PrefabTraitDef::Script { scripts, knowledge } => {
            let value_index = values.len() as u16;
            for value in knowledge {
                values.push(PrefabValue {
                    key: id_hash(&value.key),
                    value: value.value,
                });
            }
            PrefabTrait::Script {
                scripts: scripts
                    .iter()
                    .map(|id| resolve(ctx, id))
                    .collect::<Result<_, _>>()?,
                value_index,
                value_count: knowledge.len() as u16,
            }
        }
    })
}

fn prefab_flags(def: &PrefabDef, traits: &[PrefabTrait]) -> PrefabFlags {
    let mut flags = PrefabFlags::empty();
    if def.is_volatile {
        flags |= PrefabFlags::VOLATILE;
    }
    for entry in traits {
        if let PrefabTrait::SetMember { sets } = entry {
            for (set_name, set_flag) in SET_FLAGS {
                if sets.contains(&id_hash(set_name)) {
                    flags |= *set_flag;
                }
            }
        }
    }
    flags
}

/// Build the packed runtime map from a parsed definition.
pub fn build_prefab_map(
    ctx: &mut LoadContext,
    def: &PrefabMapDef,
) -> Result<PrefabMap, PrefabError> {
    if def.prefabs.len() > u16::MAX as usize {
        return Err(PrefabError::PrefabCountExceedsMax);
    }

    let mut prefabs: Vec<Prefab> = Vec::with_capacity(def.prefabs.len());
    let mut traits = Vec::new();
    let mut values = Vec::new();

    for prefab_def in &def.prefabs {
        let trait_index = traits.len() as u16;
        for (i, trait_def) in prefab_def.traits.iter().enumerate() {
            if prefab_def.traits[..i]
                .iter()
                .any(|other| other.kind() == trait_def.kind())
            {
                return Err(PrefabError::DuplicateTrait);
            }
            traits.push(build_trait(ctx, trait_def, &mut values)?);
        }
        let built = &traits[trait_index as usize..];
        let prefab = Prefab {
            name: id_hash(&prefab_def.name),
            flags: prefab_flags(prefab_def, built),
            trait_index,
            trait_count: prefab_def.traits.len() as u16,
        };
        let position = prefabs
            .binary_search_by_key(&prefab.name, |entry| entry.name)
            .err()
            .ok_or(PrefabError::DuplicatePrefab)?;
        prefabs.insert(position, prefab);
    }

    // Record where every source-order prefab ended up after sorting.
    let mut user_index_lookup = vec![0_u16; def.prefabs.len()];
    for (user_index, prefab_def) in def.prefabs.iter().enumerate() {
        let name = id_hash(&prefab_def.name);
        let position = prefabs
            .binary_search_by_key(&name, |entry| entry.name)
            .expect("prefab was inserted above");
        user_index_lookup[user_index] = position as u16;
    }

    Ok(PrefabMap {
        prefabs,
        user_index_lookup,
        traits,
        values,
    })
}

impl BlobCodec for PrefabMap {
    const TYPE_NAME: &'static str = "PrefabMap";
    const LAYOUT: &'static str = "PrefabMap{prefabs:[{name:u32,flags:u8,traitIndex:u16,\
         traitCount:u16}],userIndex:[u16],traits:[union],values:[{key:u32,value:f64}]}";

    fn encode(&self, w: &mut BlobWriter) {
        w.array(&self.prefabs, |w, prefab| {
            w.u32(prefab.name);
            w.u8(prefab.flags.bits());
            w.u16(prefab.trait_index);
            w.u16(prefab.trait_count);
        });
        w.array(&self.user_index_lookup, |w, index| w.u16(*index));
        w.array(&self.traits, |w, entry| match entry {
            PrefabTrait::Name { name } => {
                w.enum_tag(0);
                w.u32(*name);
            }
            PrefabTrait::SetMember { sets } => {
                w.enum_tag(1);
                w.array(sets, |w, set| w.u32(*set));
            }
            PrefabTrait::Renderable { graphic } => {
                w.enum_tag(2);
                graphic.encode(w);
            }
            PrefabTrait::Vfx { asset } => {
                w.enum_tag(3);
                asset.encode(w);
            }
            PrefabTrait::Decal { asset } => {
                w.enum_tag(4);
                asset.encode(w);
            }
            PrefabTrait::Sound {
                assets,
                gain,
                pitch,
            } => {
                w.enum_tag(5);
                w.array(assets, |w, asset| asset.encode(w));
                w.f32(*gain);
                w.f32(*pitch);
            }
            PrefabTrait::Lifetime { duration } => {
                w.enum_tag(6);
                w.f32(*duration);
            }
            PrefabTrait::Movement {
                speed,
                rotation_speed,
                radius,
            } => {
                w.enum_tag(7);
                w.f32(*speed);
                w.f32(*rotation_speed);
                w.f32(*radius);
            }
            PrefabTrait::Health {
                amount,
                death_destroy_delay,
            } => {
                w.enum_tag(8);
                w.f32(*amount);
                w.f32(*death_destroy_delay);
            }
            PrefabTrait::Script {
                scripts,
                value_index,
                value_count,
            } => {
                w.enum_tag(9);
                w.array(scripts, |w, script| script.encode(w));
                w.u16(*value_index);
                w.u16(*value_count);
            }
        });
        w.array(&self.values, |w, value| {
            w.u32(value.key);
            w.f64(value.value);
        });
    }

    fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        let prefabs = r.array(|r| {
            Ok(Prefab {
                name: r.u32()?,
                flags: PrefabFlags::from_bits_truncate(r.u8()?),
                trait_index: r.u16()?,
                trait_count: r.u16()?,
            })
        })?;
        let user_index_lookup = r.array(|r| r.u16())?;
        let traits = r.array(|r| {
            Ok(match r.enum_tag()? {
                0 => PrefabTrait::Name { name: r.u32()? },
                1 => PrefabTrait::SetMember {
                    sets: r.array(|r| r.u32())?,
                },
                2 => PrefabTrait::Renderable {
                    graphic: AssetRef::decode(r)?,
                },
                3 => PrefabTrait::Vfx {
                    asset: AssetRef::decode(r)?,
                },
                4 => PrefabTrait::Decal {
                    asset: AssetRef::decode(r)?,
                },
                5 => PrefabTrait::Sound {
                    assets: r.array(AssetRef::decode)?,
                    gain: r.f32()?,
                    pitch: r.f32()?,
                },
                6 => PrefabTrait::Lifetime { duration: r.f32()? },
                7 => PrefabTrait::Movement {
                    speed: r.f32()?,
                    rotation_speed: r.f32()?,
                    radius: r.f32()?,
                },
                8 => PrefabTrait::Health {
                    amount: r.f32()?,
                    death_destroy_delay: r.f32()?,
                },
                9 => PrefabTrait::Script {
                    scripts: r.array(AssetRef::decode)?,
                    value_index: r.u16()?,
                    value_count: r.u16()?,
                },
                tag => return Err(CacheError::UnionTagUnknown(tag)),
            })
        })?;
        let values = r.array(|r| {
            Ok(PrefabValue {
                key: r.u32()?,
                value: r.f64()?,
            })
        })?;
        Ok(Self {
            prefabs,
            user_index_lookup,
            traits,
            values,
        })
    }
}

/// Loader for json prefab catalogs.
pub struct PrefabsLoader;

impl AssetLoader for PrefabsLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: PrefabMapDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        let map = build_prefab_map(ctx, &def).map_err(LoadError::loader)?;
        ctx.cache(&map);
        Ok(Load::Done(Box::new(map)))
    }
}

/// Loader for binary cached prefab catalogs.
pub struct PrefabsBinLoader;

impl AssetLoader for PrefabsBinLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let mut map: PrefabMap = read_blob(&blob.data)?;
        map.rebind_refs(ctx);
        Ok(Load::Done(Box::new(map)))
    }
}
