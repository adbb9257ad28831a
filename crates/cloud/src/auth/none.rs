//! No-op authentication for local or open platform endpoints.

use crate::auth::CloudAuth;
use crate::error::Result;

/// Sends requests unsigned.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

impl CloudAuth for NoAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        _headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        Ok(())
    }
}
