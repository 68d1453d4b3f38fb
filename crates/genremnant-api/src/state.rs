use std::sync::Arc;

use genremnant_db::Database;
use genremnant_gateway::NotificationHub;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub hub: NotificationHub,
    pub jwt_secret: String,
    /// Email that is granted the admin role on registration
    pub admin_email: Option<String>,
}
