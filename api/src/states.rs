use crate::{db::Store, notify::NotificationGateway};
use std::sync::Arc;

/// Handles constructed once per process and shared by every request.
///
/// Handlers keep no state of their own: everything is re-read from `store`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifications: NotificationGateway,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, notifications: NotificationGateway) -> Self {
        Self {
            store,
            notifications,
        }
    }
}
