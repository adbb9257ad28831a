//! Request signing for the compute platform.

mod bearer;
mod none;

pub use bearer::BearerAuth;
pub use none::NoAuth;

use crate::error::Result;

/// Adds authentication headers to outgoing platform requests.
pub trait CloudAuth: Send + Sync {
    /// Insert auth headers for a request to `url` with `method`.
    fn sign_request(
        &self,
        url: &str,
        method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()>;
}
