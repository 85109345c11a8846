//! Product map: production catalogs (what factories can build), grouped in
//! named sets sorted on the name hash.

use serde::Deserialize;
use thiserror::Error;

use keel_asset::{
    AssetBlob, AssetLoader, BlobCodec, BlobReader, BlobWriter, CacheError, Load, LoadContext,
    LoadError, id_hash, read_blob,
};

use crate::refs::AssetRef;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductError {
    #[error("multiple product sets with the same name")]
    DuplicateProductSet,
    #[error("product set contains no products")]
    EmptyProductSet,
    #[error("product specifies an invalid asset reference")]
    InvalidAssetReference,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProductDef {
    #[serde(rename_all = "camelCase")]
    Unit {
        unit_prefab: String,
        #[serde(default = "default_unit_count")]
        unit_count: u32,
        #[serde(default)]
        cost_time: f32,
    },
    #[serde(rename_all = "camelCase")]
    Placable {
        prefab: String,
        #[serde(default)]
        cost_time: f32,
    },
}

fn default_unit_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductSetDef {
    pub name: String,
    pub products: Vec<ProductDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductMapDef {
    pub sets: Vec<ProductSetDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Product {
    Unit {
        unit_prefab: AssetRef,
        unit_count: u32,
        cost_time: f32,
    },
    Placable {
        prefab: AssetRef,
        cost_time: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSet {
    pub name: u32,
    pub product_index: u16,
    pub product_count: u16,
}

/// The packed runtime production catalog; sets sorted on the name hash.
#[derive(Debug, PartialEq)]
pub struct ProductMap {
    pub sets: Vec<ProductSet>,
    pub products: Vec<Product>,
}

impl ProductMap {
    pub fn find(&self, name_hash: u32) -> Option<&ProductSet> {
        self.sets
            .binary_search_by_key(&name_hash, |set| set.name)
            .ok()
            .map(|index| &self.sets[index])
    }

    pub fn set_products(&self, set: &ProductSet) -> &[Product] {
        let begin = set.product_index as usize;
        &self.products[begin..begin + set.product_count as usize]
    }

    fn rebind_refs(&mut self, ctx: &mut LoadContext) {
        for product in &mut self.products {
            match product {
                Product::Unit { unit_prefab, .. } => unit_prefab.rebind(ctx),
                Product::Placable { prefab, .. } => prefab.rebind(ctx),
            }
        }
    }
}

/// Build the packed runtime map from a parsed definition.
pub fn build_product_map(
    ctx: &mut LoadContext,
    def: &ProductMapDef,
) -> Result<ProductMap, ProductError> {
    let resolve = |ctx: &mut LoadContext, id: &str| {
        AssetRef::resolve(ctx, id).ok_or(ProductError::InvalidAssetReference)
    };

    let mut sets: Vec<ProductSet> = Vec::with_capacity(def.sets.len());
    let mut products = Vec::new();

    for set_def in &def.sets {
        if set_def.products.is_empty() {
            return Err(ProductError::EmptyProductSet);
        }
        let product_index = products.len() as u16;
        for product_def in &set_def.products {
            products.push(match product_def {
                ProductDef::Unit {
                    unit_prefab,
                    unit_count,
                    cost_time,
                } => Product::Unit {
                    unit_prefab: resolve(ctx, unit_prefab)?,
                    unit_count: *unit_count,
                    cost_time: *cost_time,
                },
                ProductDef::Placable { prefab, cost_time } => Product::Placable {
                    prefab: resolve(ctx, prefab)?,
                    cost_time: *cost_time,
                },
            });
        }
        let set = ProductSet {
            name: id_hash(&set_def.name),
            product_index,
            product_count: set_def.products.len() as u16,
        };
        let position = sets
            .binary_search_by_key(&set.name, |entry| entry.name)
            .err()
            .ok_or(ProductError::DuplicateProductSet)?;
        sets.insert(position, set);
    }

    Ok(ProductMap { sets, products })
}

impl BlobCodec for ProductMap {
    const TYPE_NAME: &'static str = "ProductMap";
    const LAYOUT: &'static str = "ProductMap{sets:[{name:u32,productIndex:u16,\
         productCount:u16}],products:[union]}";

    fn encode(&self, w: &mut BlobWriter) {
        w.array(&self.sets, |w, set| {
            w.u32(set.name);
            w.u16(set.product_index);
            w.u16(set.product_count);
        });
        w.array(&self.products, |w, product| match product {
            Product::Unit {
                unit_prefab,
                unit_count,
                cost_time,
            } => {
                w.enum_tag(0);
                unit_prefab.encode(w);
                w.u32(*unit_count);
                w.f32(*cost_time);
            }
            Product::Placable { prefab, cost_time } => {
                w.enum_tag(1);
                prefab.encode(w);
                w.f32(*cost_time);
            }
        });
    }

    fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        let sets = r.array(|r| {
            Ok(ProductSet {
                name: r.u32()?,
                product_index: r.u16()?,
                product_count: r.u16()?,
            })
        })?;
        let products = r.array(|r| {
            Ok(match r.enum_tag()? {
                0 => Product::Unit {
                    unit_prefab: AssetRef::decode(r)?,
                    unit_count: r.u32()?,
                    cost_time: r.f32()?,
                },
                1 => Product::Placable {
                    prefab: AssetRef::decode(r)?,
                    cost_time: r.f32()?,
                },
                tag => return Err(CacheError::UnionTagUnknown(tag)),
            })
        })?;
        Ok(Self { sets, products })
    }
}

/// Loader for json production catalogs.
pub struct ProductsLoader;

impl AssetLoader for ProductsLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: ProductMapDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        let map = build_product_map(ctx, &def).map_err(LoadError::loader)?;
        ctx.cache(&map);
        Ok(Load::Done(Box::new(map)))
    }
}

/// Loader for binary cached production catalogs.
pub struct ProductsBinLoader;

impl AssetLoader for ProductsBinLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let mut map: ProductMap = read_blob(&blob.data)?;
        map.rebind_refs(ctx);
        Ok(Load::Done(Box::new(map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_asset::{AssetFormat, AssetManager, AssetManagerFlags, MemoryAssetIo};

    const MAP: &[u8] = br#"{
        "sets": [
            {
                "name": "barracks",
                "products": [
                    {"type": "unit", "unitPrefab": "grunt", "unitCount": 4, "costTime": 10},
                    {"type": "unit", "unitPrefab": "sniper"}
                ]
            },
            {
                "name": "builder",
                "products": [
                    {"type": "placable", "prefab": "wall", "costTime": 2}
                ]
            }
        ]
    }"#;

    fn load_map(source: &'static [u8]) -> (AssetManager, keel_asset::AssetId) {
        let io = MemoryAssetIo::from_records([("p.products", source)]);
        let mut manager = AssetManager::new(io, AssetManagerFlags::empty());
        manager.register_loader(AssetFormat::Products, ProductsLoader);
        let asset = manager.lookup("p.products");
        manager.acquire(asset);
        manager.tick();
        manager.tick();
        (manager, asset)
    }

    #[test]
    fn builds_sorted_set_table() {
        let (manager, asset) = load_map(MAP);
        assert!(manager.is_loaded(asset));
        let map = manager.get::<ProductMap>(asset).unwrap();

        assert_eq!(map.sets.len(), 2);
        assert!(map.sets.windows(2).all(|w| w[0].name < w[1].name));

        let barracks = map.find(id_hash("barracks")).unwrap();
        assert_eq!(barracks.product_count, 2);
        let products = map.set_products(barracks);
        assert!(matches!(
            products[0],
            Product::Unit { unit_count: 4, .. }
        ));
        // Unit count defaults to one.
        assert!(matches!(products[1], Product::Unit { unit_count: 1, .. }));
    }

    #[test]
    fn empty_sets_fail() {
        let source = br#"{"sets": [{"name": "empty", "products": []}]}"#;
        let (manager, asset) = load_map(source);
        assert!(manager.is_failed(asset));
    }

    #[test]
    fn duplicate_sets_fail() {
        let source = br#"{"sets": [
            {"name": "a", "products": [{"type": "placable", "prefab": "wall"}]},
            {"name": "a", "products": [{"type": "placable", "prefab": "gate"}]}
        ]}"#;
        let (manager, asset) = load_map(source);
        assert!(manager.is_failed(asset));
    }

    #[test]
    fn codec_round_trips() {
        let (manager, asset) = load_map(MAP);
        let map = manager.get::<ProductMap>(asset).unwrap();
        let blob = keel_asset::write_blob(map);
        let decoded: ProductMap = keel_asset::read_blob(&blob).unwrap();
        assert_eq!(decoded.sets, map.sets);
    }
}
