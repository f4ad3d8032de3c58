//! HTTP API: signal submission, feedback listing, group management and remote proving.

mod error;
mod handlers;
mod responses;
mod server;

pub use error::{ApiError, ApiResult, ErrorBody, ErrorDetail};
pub use handlers::GroupResponse;
pub use responses::*;
pub use server::{router, ApiServer, AppState};

#[cfg(test)]
mod tests;
