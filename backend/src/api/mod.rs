//! API module - HTTP handlers and middleware.

pub mod download_response;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;
use crate::services::audit_service::AuditService;
use crate::services::auth_service::AuthService;
use crate::services::catalog_service::CatalogService;
use crate::services::directory_service::DirectoryService;
use crate::services::export_service::ExportService;
use crate::services::grant_service::GrantService;
use crate::services::import_service::ImportService;
use crate::storage::Store;

/// Application state shared across handlers
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub auth: Arc<AuthService>,
    pub audit: AuditService,
    pub directory: DirectoryService,
    pub catalog: CatalogService,
    pub grants: GrantService,
    pub export: ExportService,
    pub import: ImportService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let config = Arc::new(config);
        let audit = AuditService::new(store.clone());
        let grants = GrantService::new(store.clone(), audit.clone());
        Self {
            auth: Arc::new(AuthService::new(store.clone(), config.clone())),
            directory: DirectoryService::new(store.clone(), audit.clone()),
            catalog: CatalogService::new(store.clone(), audit.clone()),
            export: ExportService::new(store.clone(), grants.clone()),
            import: ImportService::new(store.clone(), audit.clone()),
            grants,
            audit,
            config,
            store,
        }
    }

    /// Page size from `?per_page=`, falling back to `DEFAULT_PAGE_SIZE`
    pub fn per_page(&self, requested: &dto::PaginationQuery) -> u32 {
        requested.per_page(self.config.default_page_size)
    }
}

pub type SharedState = Arc<AppState>;
