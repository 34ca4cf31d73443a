use std::{ops::Deref, sync::Arc};

/// A page of physical memory read from the backend.
///
/// Pages are immutable once read and are shared between the caches and
/// readers, so cloning only bumps a reference count.
#[derive(Clone)]
pub struct MappedPage(Arc<dyn Deref<Target = [u8]> + Send + Sync>);

impl MappedPage {
    /// Creates a new mapped page.
    pub fn new<T>(inner: T) -> Self
    where
        T: Deref<Target = [u8]> + Send + Sync + 'static,
    {
        Self(Arc::new(inner))
    }
}

impl Deref for MappedPage {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for MappedPage {
    fn as_ref(&self) -> &[u8] {
        self.deref()
    }
}

impl std::fmt::Debug for MappedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MappedPage").field("len", &self.len()).finish()
    }
}
