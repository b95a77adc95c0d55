//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use crm_storage::CrmStore;

use crate::config::ApiConfig;
use crate::services::audit::AuditWriter;
use crate::services::calendar::CalendarSync;

pub type SharedStore = Arc<dyn CrmStore>;
pub type SharedCalendar = Arc<dyn CalendarSync>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub calendar: SharedCalendar,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: SharedStore, calendar: SharedCalendar, config: ApiConfig) -> Self {
        Self {
            store,
            calendar,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn audit(&self) -> AuditWriter {
        AuditWriter::new(self.store.clone())
    }
}

crate::impl_from_ref!(SharedStore, store);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Instant, start_time);
