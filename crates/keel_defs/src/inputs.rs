//! Input map: named actions with their key bindings, flattened into a
//! name-hash sorted action table.

use serde::Deserialize;
use thiserror::Error;

use keel_asset::{
    AssetBlob, AssetLoader, BlobCodec, BlobReader, BlobWriter, CacheError, Load, LoadContext,
    LoadError, id_hash, read_blob,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMapError {
    #[error("multiple actions with the same name")]
    DuplicateAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingType {
    /// The key transitioned to pressed this frame.
    Pressed,
    /// The key transitioned to released this frame.
    Released,
    /// The key is held down.
    Down,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BindingDef {
    #[serde(rename = "type")]
    pub ty: BindingType,
    pub key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionDef {
    pub name: String,
    pub bindings: Vec<BindingDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InputMapDef {
    pub actions: Vec<ActionDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBinding {
    pub ty: BindingType,
    /// Hash of the key name.
    pub key: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputAction {
    pub name: u32,
    pub binding_index: u16,
    pub binding_count: u16,
}

/// The packed runtime input map; actions sorted on the name hash.
#[derive(Debug, PartialEq, Eq)]
pub struct InputMap {
    pub actions: Vec<InputAction>,
    pub bindings: Vec<InputBinding>,
}

impl InputMap {
    pub fn find(&self, name_hash: u32) -> Option<&InputAction> {
        self.actions
            .binary_search_by_key(&name_hash, |action| action.name)
            .ok()
            .map(|index| &self.actions[index])
    }

    pub fn action_bindings(&self, action: &InputAction) -> &[InputBinding] {
        let begin = action.binding_index as usize;
        &self.bindings[begin..begin + action.binding_count as usize]
    }
}

/// Build the packed runtime map from a parsed definition. Action names have
/// to be unique.
pub fn build_input_map(def: &InputMapDef) -> Result<InputMap, InputMapError> {
    let mut actions: Vec<InputAction> = Vec::with_capacity(def.actions.len());
    let mut bindings = Vec::new();

    for action_def in &def.actions {
        let binding_index = bindings.len() as u16;
        for binding_def in &action_def.bindings {
            bindings.push(InputBinding {
                ty: binding_def.ty,
                key: id_hash(&binding_def.key),
            });
        }
        let action = InputAction {
            name: id_hash(&action_def.name),
            binding_index,
            binding_count: action_def.bindings.len() as u16,
        };
        let position = actions
            .binary_search_by_key(&action.name, |entry| entry.name)
            .err()
            .ok_or(InputMapError::DuplicateAction)?;
        actions.insert(position, action);
    }

    Ok(InputMap { actions, bindings })
}

impl BlobCodec for InputMap {
    const TYPE_NAME: &'static str = "InputMap";
    const LAYOUT: &'static str = "InputMap{actions:[{name:u32,bindingIndex:u16,\
         bindingCount:u16}],bindings:[{type:enum,key:u32}]}";

    fn encode(&self, w: &mut BlobWriter) {
        w.array(&self.actions, |w, action| {
            w.u32(action.name);
            w.u16(action.binding_index);
            w.u16(action.binding_count);
        });
        w.array(&self.bindings, |w, binding| {
            w.enum_tag(binding.ty as u32);
            w.u32(binding.key);
        });
    }

    fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        let actions = r.array(|r| {
            Ok(InputAction {
                name: r.u32()?,
                binding_index: r.u16()?,
                binding_count: r.u16()?,
            })
        })?;
        let bindings = r.array(|r| {
            let ty = match r.enum_tag()? {
                0 => BindingType::Pressed,
                1 => BindingType::Released,
                2 => BindingType::Down,
                tag => return Err(CacheError::UnionTagUnknown(tag)),
            };
            Ok(InputBinding { ty, key: r.u32()? })
        })?;
        Ok(Self { actions, bindings })
    }
}

/// Loader for json input maps.
pub struct InputsLoader;

impl AssetLoader for InputsLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: InputMapDef = serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        let map = build_input_map(&def).map_err(LoadError::loader)?;
        ctx.cache(&map);
        Ok(Load::Done(Box::new(map)))
    }
}

/// Loader for binary cached input maps.
pub struct InputsBinLoader;

impl AssetLoader for InputsBinLoader {
    fn load(&self, _ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let map: InputMap = read_blob(&blob.data)?;
        Ok(Load::Done(Box::new(map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &[u8]) -> InputMapDef {
        serde_json::from_slice(source).unwrap()
    }

    #[test]
    fn builds_sorted_action_table() {
        let def = parse(
            br#"{"actions": [
                {"name": "jump", "bindings": [{"type": "pressed", "key": "space"}]},
                {"name": "forward", "bindings": [
                    {"type": "down", "key": "w"},
                    {"type": "down", "key": "arrowUp"}
                ]}
            ]}"#,
        );
        let map = build_input_map(&def).unwrap();

        assert_eq!(map.actions.len(), 2);
        assert!(map.actions.windows(2).all(|w| w[0].name < w[1].name));

        let forward = map.find(id_hash("forward")).unwrap();
        assert_eq!(forward.binding_count, 2);
        let bindings = map.action_bindings(forward);
        assert_eq!(bindings[0].ty, BindingType::Down);
        assert_eq!(bindings[0].key, id_hash("w"));
        assert_eq!(bindings[1].key, id_hash("arrowUp"));

        let jump = map.find(id_hash("jump")).unwrap();
        assert_eq!(map.action_bindings(jump)[0].ty, BindingType::Pressed);
    }

    #[test]
    fn duplicate_actions_are_rejected() {
        let def = parse(
            br#"{"actions": [
                {"name": "jump", "bindings": [{"type": "pressed", "key": "space"}]},
                {"name": "jump", "bindings": [{"type": "pressed", "key": "j"}]}
            ]}"#,
        );
        assert_eq!(build_input_map(&def), Err(InputMapError::DuplicateAction));
    }

    #[test]
    fn codec_round_trips() {
        let def = parse(
            br#"{"actions": [
                {"name": "fire", "bindings": [{"type": "released", "key": "mouse1"}]}
            ]}"#,
        );
        let map = build_input_map(&def).unwrap();
        let blob = keel_asset::write_blob(&map);
        assert_eq!(keel_asset::read_blob::<InputMap>(&blob).unwrap(), map);
    }
}
