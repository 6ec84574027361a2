use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// The host's answer to "which bookmarks are outstanding right now".
///
/// Queried by the tracker at the point a record is applied; the answer is
/// kept as a snapshot, never polled again.
pub trait BookmarkSource: Send + Sync {
    fn bookmarks(&self) -> BTreeSet<String>;
}

impl BookmarkSource for BTreeSet<String> {
    fn bookmarks(&self) -> BTreeSet<String> {
        self.clone()
    }
}

/// A bookmark set the host mutates and trackers read.
#[derive(Debug, Clone, Default)]
pub struct BookmarkSet {
    inner: Arc<RwLock<BTreeSet<String>>>,
}

impl BookmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the outstanding bookmarks.
    pub fn replace<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn clear(&self) {
        self.replace(std::iter::empty::<String>());
    }
}

impl BookmarkSource for BookmarkSet {
    fn bookmarks(&self) -> BTreeSet<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
