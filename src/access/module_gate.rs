use super::store::ModuleStore;
use crate::errors::{AppError, AppResult};

/// Coarse on/off switch for a whole capability area. Unknown slugs are disabled.
pub struct ModuleGate<'a> {
    store: &'a dyn ModuleStore,
}

impl<'a> ModuleGate<'a> {
    pub fn new(store: &'a dyn ModuleStore) -> Self {
        Self { store }
    }

    pub async fn is_enabled(&self, slug: &str) -> AppResult<bool> {
        self.store.is_module_enabled(slug).await
    }

    /// Disabled modules surface as not-found.
    pub async fn ensure_enabled(&self, slug: &str) -> AppResult<()> {
        if self.is_enabled(slug).await? {
            Ok(())
        } else {
            Err(AppError::module_disabled(slug))
        }
    }
}
