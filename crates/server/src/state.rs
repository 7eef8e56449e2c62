use std::sync::Arc;

use manhwadex_core::{CatalogueService, Config, SanitizedConfig, Syncer};

/// Shared application state
pub struct AppState {
    config: Config,
    service: Arc<CatalogueService>,
    syncer: Arc<Syncer>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<CatalogueService>, syncer: Arc<Syncer>) -> Self {
        Self {
            config,
            service,
            syncer,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Get the catalogue service facade
    pub fn service(&self) -> &Arc<CatalogueService> {
        &self.service
    }

    /// Get the background synchroniser
    pub fn syncer(&self) -> &Arc<Syncer> {
        &self.syncer
    }
}
