use derive_more::Display;
use sheaf_engine::Thumbnail;
use std::collections::HashMap;
use std::sync::Arc;

/// A revocable reference to a stored preview.
///
/// Handles are never reused, so a revoked handle stays dead even after new
/// previews are stored.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[display("preview:{_0}")]
pub struct PreviewHandle(u64);

/// Owns every live preview of a session.
///
/// Records only hold handles. Removing a record must revoke its handle,
/// otherwise the preview lives as long as the session does.
#[derive(Debug, Default)]
pub struct PreviewStore {
    next: u64,
    previews: HashMap<PreviewHandle, Arc<Thumbnail>>,
}

impl PreviewStore {
    pub fn insert(&mut self, thumbnail: Thumbnail) -> PreviewHandle {
        self.next += 1;
        let handle = PreviewHandle(self.next);
        self.previews.insert(handle, Arc::new(thumbnail));
        handle
    }

    pub fn get(&self, handle: PreviewHandle) -> Option<Arc<Thumbnail>> {
        self.previews.get(&handle).cloned()
    }

    /// Returns `false` if the handle was already revoked.
    pub fn revoke(&mut self, handle: PreviewHandle) -> bool {
        self.previews.remove(&handle).is_some()
    }

    /// Revoke everything; returns how many handles were live.
    pub fn clear(&mut self) -> usize {
        let live = self.previews.len();
        self.previews.clear();
        live
    }

    pub fn live(&self) -> usize {
        self.previews.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_engine::Dimensions;

    fn thumbnail() -> Thumbnail {
        Thumbnail {
            dimensions: Dimensions::new(1, 1),
            bytes: vec![0xFF, 0xD8],
        }
    }

    #[test]
    fn revoked_handles_stay_revoked() {
        let mut store = PreviewStore::default();
        let first = store.insert(thumbnail());
        assert!(store.revoke(first));
        assert!(!store.revoke(first));

        let second = store.insert(thumbnail());
        assert_ne!(first, second);
        assert!(store.get(first).is_none());
        assert!(store.get(second).is_some());
        assert_eq!(store.live(), 1);
    }

    #[test]
    fn clear_reports_live_handles() {
        let mut store = PreviewStore::default();
        store.insert(thumbnail());
        store.insert(thumbnail());
        assert_eq!(store.clear(), 2);
        assert_eq!(store.live(), 0);
    }
}
