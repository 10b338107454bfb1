pub mod auth;
pub mod handlers;
pub mod routes;
mod state;
pub mod upload;

pub use state::AppState;
