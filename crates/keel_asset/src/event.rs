use crate::AssetId;

/// Lifecycle events reported by the [`AssetManager`](crate::AssetManager).
///
/// Events are queued during [`AssetManager::tick`](crate::AssetManager::tick)
/// and drained by the embedding application once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetEvent {
    /// The asset finished loading and its runtime value is available.
    Loaded { id: AssetId },
    /// The asset failed to load; the failure is sticky until reacquired.
    Failed { id: AssetId },
    /// The asset's runtime value was detached.
    Unloaded { id: AssetId },
    /// The asset's source was modified (or a reload was requested).
    Changed { id: AssetId },
}

impl AssetEvent {
    /// The asset this event concerns.
    pub fn id(&self) -> AssetId {
        match *self {
            AssetEvent::Loaded { id }
            | AssetEvent::Failed { id }
            | AssetEvent::Unloaded { id }
            | AssetEvent::Changed { id } => id,
        }
    }
}
