use keel_asset::{AssetId, BlobReader, BlobWriter, CacheError, LoadContext};

/// A reference from one asset definition to another asset, by id.
///
/// The handle is bound when the owning definition is loaded; cache blobs only
/// carry the id string and rebind on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub id: String,
    pub entity: AssetId,
}

impl AssetRef {
    /// Resolve an id to a bound reference and record the dependency edge so
    /// that changes to the referenced asset invalidate the referencing one.
    /// Empty ids are invalid.
    pub fn resolve(ctx: &mut LoadContext, id: &str) -> Option<Self> {
        if id.is_empty() {
            return None;
        }
        let entity = ctx.lookup(id);
        ctx.register_dep(entity);
        Some(Self {
            id: id.to_owned(),
            entity,
        })
    }

    /// Rebind the handle after decoding from a cache blob.
    pub fn rebind(&mut self, ctx: &mut LoadContext) {
        self.entity = ctx.lookup(&self.id);
        ctx.register_dep(self.entity);
    }

    pub(crate) fn encode(&self, w: &mut BlobWriter) {
        w.string(&self.id);
    }

    pub(crate) fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        let id = r.string()?;
        if id.is_empty() {
            return Err(CacheError::Malformed);
        }
        Ok(Self {
            id,
            entity: AssetId::INVALID,
        })
    }
}
