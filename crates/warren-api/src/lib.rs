pub mod auth;
pub mod channels;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod routes;

pub use auth::{AppState, AppStateInner};
