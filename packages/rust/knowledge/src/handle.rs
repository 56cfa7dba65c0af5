//! Shared, atomically swappable reference to the current knowledge base.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::info;

use crate::KnowledgeBase;

/// Readers take a snapshot with [`KnowledgeHandle::current`] and keep using
/// it for the whole request; a concurrent [`KnowledgeHandle::replace`] only
/// affects later snapshots. Descriptors and their compatibility graph always
/// come from the same snapshot.
#[derive(Debug)]
pub struct KnowledgeHandle {
    current: ArcSwapOption<KnowledgeBase>,
}

impl KnowledgeHandle {
    /// A handle with nothing loaded yet.
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// The published knowledge base, if any. Lock-free.
    pub fn current(&self) -> Option<Arc<KnowledgeBase>> {
        self.current.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Publish a fully built knowledge base in a single pointer swap.
    pub fn replace(&self, kb: KnowledgeBase) -> Arc<KnowledgeBase> {
        let kb = Arc::new(kb);
        let stats = kb.stats();
        self.current.store(Some(Arc::clone(&kb)));
        info!(
            components = stats.components,
            edges = stats.compatibility_edges,
            "knowledge base published"
        );
        kb
    }
}

impl Default for KnowledgeHandle {
    fn default() -> Self {
        Self::new()
    }
}
