//! Weapon map: named attack definitions with their effect chains, packed
//! into a name-hash sorted table.

use serde::Deserialize;
use thiserror::Error;

use keel_asset::{
    AssetBlob, AssetLoader, BlobCodec, BlobReader, BlobWriter, CacheError, Load, LoadContext,
    LoadError, id_hash, read_blob,
};

use crate::refs::AssetRef;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponError {
    #[error("multiple weapons with the same name")]
    DuplicateWeapon,
    #[error("weapon specifies an invalid asset reference")]
    InvalidAssetReference,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WeaponEffectDef {
    #[serde(rename_all = "camelCase")]
    Projectile {
        vfx: String,
        speed: f32,
        damage: f32,
        #[serde(default)]
        spread_angle: f32,
        #[serde(default)]
        delay: f32,
    },
    #[serde(rename_all = "camelCase")]
    Damage {
        amount: f32,
        #[serde(default)]
        radius: f32,
        #[serde(default)]
        delay: f32,
    },
    #[serde(rename_all = "camelCase")]
    Animation {
        layer: String,
        #[serde(default)]
        speed: f32,
    },
    #[serde(rename_all = "camelCase")]
    Vfx {
        asset: String,
        #[serde(default)]
        duration: f32,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WeaponDef {
    pub name: String,
    #[serde(default)]
    pub interval_min: f32,
    #[serde(default)]
    pub interval_max: f32,
    #[serde(default)]
    pub ready_while_moving: bool,
    #[serde(default)]
    pub effects: Vec<WeaponEffectDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WeaponMapDef {
    pub weapons: Vec<WeaponDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeaponEffect {
    Projectile {
        vfx: AssetRef,
        speed: f32,
        damage: f32,
        spread_angle: f32,
        delay: f32,
    },
    Damage {
        amount: f32,
        radius: f32,
        delay: f32,
    },
    Animation {
        layer: u32,
        speed: f32,
    },
    Vfx {
        asset: AssetRef,
        duration: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weapon {
    pub name: u32,
    pub interval_min: f32,
    pub interval_max: f32,
    pub ready_while_moving: bool,
    pub effect_index: u16,
    pub effect_count: u16,
}

/// The packed runtime weapon catalog; weapons sorted on the name hash.
#[derive(Debug, PartialEq)]
pub struct WeaponMap {
    pub weapons: Vec<Weapon>,
    pub effects: Vec<WeaponEffect>,
}

impl WeaponMap {
    pub fn find(&self, name_hash: u32) -> Option<&Weapon> {
        self.weapons
            .binary_search_by_key(&name_hash, |weapon| weapon.name)
            .ok()
            .map(|index| &self.weapons[index])
    }

    pub fn weapon_effects(&self, weapon: &Weapon) -> &[WeaponEffect] {
        let begin = weapon.effect_index as usize;
        &self.effects[begin..begin + weapon.effect_count as usize]
    }

    fn rebind_refs(&mut self, ctx: &mut LoadContext) {
        for effect in &mut self.effects {
            match effect {
                WeaponEffect::Projectile { vfx, .. } => vfx.rebind(ctx),
                WeaponEffect::Vfx { asset, .. } => asset.rebind(ctx),
                _ => {}
            }
        }
    }
}

/// Build the packed runtime map from a parsed definition.
pub fn build_weapon_map(
    ctx: &mut LoadContext,
    def: &WeaponMapDef,
) -> Result<WeaponMap, WeaponError> {
    let resolve = |ctx: &mut LoadContext, id: &str| {
        AssetRef::resolve(ctx, id).ok_or(WeaponError::InvalidAssetReference)
    };

    let mut weapons: Vec<Weapon> = Vec::with_capacity(def.weapons.len());
    let mut effects = Vec::new();

    for weapon_def in &def.weapons {
        let effect_index = effects.len() as u16;
        for effect_def in &weapon_def.effects {
            effects.push(match effect_def {
                WeaponEffectDef::Projectile {
                    vfx,
                    speed,
                    damage,
                    spread_angle,
                    delay,
                } => WeaponEffect::Projectile {
                    vfx: resolve(ctx, vfx)?,
                    speed: *speed,
                    damage: *damage,
                    spread_angle: *spread_angle,
                    delay: *delay,
                },
                WeaponEffectDef::Damage {
                    amount,
                    radius,
                    delay,
                } => WeaponEffect::Damage {
                    amount: *amount,
                    radius: *radius,
                    delay: *delay,
                },
                WeaponEffectDef::Animation { layer, speed } => WeaponEffect::Animation {
                    layer: id_hash(layer),
                    speed: *speed,
                },
                WeaponEffectDef::Vfx { asset, duration } => WeaponEffect::Vfx {
                    asset: resolve(ctx, asset)?,
                    duration: *duration,
                },
            });
        }
        let weapon = Weapon {
            name: id_hash(&weapon_def.name),
            interval_min: weapon_def.interval_min,
            interval_max: weapon_def.interval_max,
            ready_while_moving: weapon_def.ready_while_moving,
            effect_index,
            effect_count: weapon_def.effects.len() as u16,
        };
        let position = weapons
            .binary_search_by_key(&weapon.name, |entry| entry.name)
            .err()
            .ok_or(WeaponError::DuplicateWeapon)?;
        weapons.insert(position, weapon);
    }

    Ok(WeaponMap { weapons, effects })
}

impl BlobCodec for WeaponMap {
    const TYPE_NAME: &'static str = "WeaponMap";
    const LAYOUT: &'static str = "WeaponMap{weapons:[{name:u32,intervalMin:f32,intervalMax:f32,\
         readyWhileMoving:bool,effectIndex:u16,effectCount:u16}],effects:[union]}";

    fn encode(&self, w: &mut BlobWriter) {
        w.array(&self.weapons, |w, weapon| {
            w.u32(weapon.name);
            w.f32(weapon.interval_min);
            w.f32(weapon.interval_max);
            w.bool(weapon.ready_while_moving);
            w.u16(weapon.effect_index);
            w.u16(weapon.effect_count);
        });
        w.array(&self.effects, |w, effect| match effect {
            WeaponEffect::Projectile {
                vfx,
                speed,
                damage,
                spread_angle,
                delay,
            } => {
                w.enum_tag(0);
                vfx.encode(w);
                w.f32(*speed);
                w.f32(*damage);
                w.f32(*spread_angle);
                w.f32(*delay);
            }
            WeaponEffect::Damage {
                amount,
                radius,
                delay,
            } => {
                w.enum_tag(1);
                w.f32(*amount);
                w.f32(*radius);
                w.f32(*delay);
            }
            WeaponEffect::Animation { layer, speed } => {
                w.enum_tag(2);
                w.u32(*layer);
                w.f32(*speed);
            }
            WeaponEffect::Vfx { asset, duration } => {
                w.enum_tag(3);
                asset.encode(w);
                w.f32(*duration);
            }
        });
    }

    fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        let weapons = r.array(|r| {
            Ok(Weapon {
                name: r.u32()?,
                interval_min: r.f32()?,
                interval_max: r.f32()?,
                ready_while_moving: r.bool()?,
                effect_index: r.u16()?,
                effect_count: r.u16()?,
            })
        })?;
        let effects = r.array(|r| {
            Ok(match r.enum_tag()? {
                0 => WeaponEffect::Projectile {
                    vfx: AssetRef::decode(r)?,
                    speed: r.f32()?,
                    damage: r.f32()?,
                    spread_angle: r.f32()?,
                    delay: r.f32()?,
                },
                1 => WeaponEffect::Damage {
                    amount: r.f32()?,
                    radius: r.f32()?,
                    delay: r.f32()?,
                },
                2 => WeaponEffect::Animation {
                    layer: r.u32()?,
                    speed: r.f32()?,
                },
                3 => WeaponEffect::Vfx {
                    asset: AssetRef::decode(r)?,
                    duration: r.f32()?,
                },
                tag => return Err(CacheError::UnionTagUnknown(tag)),
            })
        })?;
        Ok(Self { weapons, effects })
    }
}

/// Loader for json weapon catalogs.
pub struct WeaponsLoader;

impl AssetLoader for WeaponsLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: WeaponMapDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        let map = build_weapon_map(ctx, &def).map_err(LoadError::loader)?;
        ctx.cache(&map);
        Ok(Load::Done(Box::new(map)))
    }
}

/// Loader for binary cached weapon catalogs.
pub struct WeaponsBinLoader;

impl AssetLoader for WeaponsBinLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let mut map: WeaponMap = read_blob(&blob.data)?;
        map.rebind_refs(ctx);
        Ok(Load::Done(Box::new(map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_asset::{AssetFormat, AssetManager, AssetManagerFlags, MemoryAssetIo};

    const MAP: &[u8] = br#"{
        "weapons": [
            {
                "name": "rifle",
                "intervalMin": 0.2,
                "intervalMax": 0.3,
                "effects": [
                    {"type": "projectile", "vfx": "vfx/muzzle.vfx", "speed": 50, "damage": 10},
                    {"type": "animation", "layer": "fire", "speed": 1.5}
                ]
            },
            {
                "name": "melee",
                "effects": [
                    {"type": "damage", "amount": 25, "radius": 1.5}
                ]
            }
        ]
    }"#;

    fn load_map(source: &'static [u8]) -> (AssetManager, keel_asset::AssetId) {
        let io = MemoryAssetIo::from_records([("w.weapons", source)]);
        let mut manager = AssetManager::new(io, AssetManagerFlags::empty());
        manager.register_loader(AssetFormat::Weapons, WeaponsLoader);
        let asset = manager.lookup("w.weapons");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        (manager, asset)
    }

    #[test]
    fn builds_sorted_weapon_table() {
        let (manager, asset) = load_map(MAP);
        assert!(manager.is_loaded(asset));
        let map = manager.get::<WeaponMap>(asset).unwrap();

        assert_eq!(map.weapons.len(), 2);
        assert!(map.weapons.windows(2).all(|w| w[0].name < w[1].name));

        let rifle = map.find(id_hash("rifle")).unwrap();
        assert_eq!(rifle.effect_count, 2);
        assert!((rifle.interval_min - 0.2).abs() < 1.0e-6);
        let effects = map.weapon_effects(rifle);
        assert!(matches!(effects[0], WeaponEffect::Projectile { .. }));
        assert!(matches!(
            effects[1],
            WeaponEffect::Animation { layer, .. } if layer == id_hash("fire")
        ));

        assert!(map.find(id_hash("missing")).is_none());
    }

    #[test]
    fn duplicate_weapons_fail() {
        let source = br#"{"weapons": [{"name": "a"}, {"name": "a"}]}"#;
        let (manager, asset) = load_map(source);
        assert!(manager.is_failed(asset));
    }

    #[test]
    fn codec_round_trips() {
        let (manager, asset) = load_map(MAP);
        let map = manager.get::<WeaponMap>(asset).unwrap();
        let blob = keel_asset::write_blob(map);
        let decoded: WeaponMap = keel_asset::read_blob(&blob).unwrap();
        assert_eq!(decoded.weapons, map.weapons);
        assert_eq!(decoded.effects.len(), map.effects.len());
    }
}
