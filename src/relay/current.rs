//! Shared "current backend" value reported to callers

use parking_lot::RwLock;
use std::sync::Arc;

use crate::backend::BackendKind;

/// Last successfully selected backend kind.
///
/// Shared by every call of one relay. Writers do not coordinate: when calls
/// requesting different engines run concurrently, the last selection to finish
/// is what gets reported.
#[derive(Debug, Clone)]
pub struct CurrentBackend {
    kind: Arc<RwLock<BackendKind>>,
}

impl CurrentBackend {
    pub fn new(initial: BackendKind) -> Self {
        Self {
            kind: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> BackendKind {
        *self.kind.read()
    }

    pub fn set(&self, kind: BackendKind) {
        *self.kind.write() = kind;
    }
}

impl Default for CurrentBackend {
    fn default() -> Self {
        Self::new(BackendKind::ChatGptUnofficialProxyApi)
    }
}
