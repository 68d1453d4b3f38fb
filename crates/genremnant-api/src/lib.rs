pub mod admin;
pub mod auth;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod reactions;
pub mod router;
pub mod state;
pub mod users;

pub use error::{ApiError, ApiResult};
pub use router::router;
pub use state::{AppState, AppStateInner};
