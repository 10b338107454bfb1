#[allow(clippy::module_inception)]
mod error;

pub use self::error::{AppError, AppResult};
