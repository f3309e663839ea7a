use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::GpuTexture;

/// Shared, deferred reference to a GPU texture.
///
/// A handle is handed out before its texture exists and filled in place once
/// the texture is uploaded, so every holder observes the upload. Identity is
/// the shared allocation: clones compare equal, two separately created
/// handles never do, even while both are still empty.
#[derive(Clone)]
pub struct TextureHandle {
    cell: Arc<RwLock<Option<GpuTexture>>>,
}

impl TextureHandle {
    /// A handle with no texture behind it yet.
    pub fn empty() -> Self {
        Self {
            cell: Arc::new(RwLock::new(None)),
        }
    }

    /// Address-derived identity, stable for the lifetime of the handle.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.cell) as usize
    }

    /// The uploaded texture, or `None` if the upload has not happened or
    /// failed.
    pub fn gpu(&self) -> Option<GpuTexture> {
        *self.cell.read()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.read().is_some()
    }

    /// Promote the handle to point at an uploaded texture.
    pub fn fill(&self, texture: GpuTexture) {
        *self.cell.write() = Some(texture);
    }

    /// Detach the texture so it can be deleted exactly once.
    pub fn take(&self) -> Option<GpuTexture> {
        self.cell.write().take()
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for TextureHandle {}

impl Hash for TextureHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("gpu", &self.gpu())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn clones_share_identity_and_contents() {
        let a = TextureHandle::empty();
        let b = a.clone();
        assert_eq!(a, b);
        assert!(!b.is_loaded());

        a.fill(GpuTexture {
            id: 7,
            width: 2,
            height: 2,
        });
        assert_eq!(b.gpu().map(|t| t.id), Some(7));
    }

    #[test]
    fn separate_empty_handles_are_distinct() {
        let a = TextureHandle::empty();
        let b = TextureHandle::empty();
        assert_ne!(a, b);

        let set: HashSet<_> = [a.clone(), b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn take_empties_every_clone() {
        let a = TextureHandle::empty();
        let b = a.clone();
        a.fill(GpuTexture {
            id: 1,
            width: 1,
            height: 1,
        });
        assert!(b.take().is_some());
        assert!(a.take().is_none());
    }
}
