//! Static bearer-token authentication (service account tokens).

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};

/// Adds `Authorization: Bearer <token>` to every request.
#[derive(Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CloudError::Auth("empty bearer token".into()));
        }
        Ok(Self { token })
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").field("token", &"***").finish()
    }
}

impl CloudAuth for BearerAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        headers.push(("Authorization".into(), format!("Bearer {}", self.token)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_authorization_header() {
        let auth = BearerAuth::new("abc").unwrap();
        let mut headers = Vec::new();
        auth.sign_request("https://x", "GET", &mut headers).unwrap();
        assert_eq!(headers, vec![("Authorization".to_string(), "Bearer abc".to_string())]);
        assert!(!format!("{:?}", auth).contains("abc"));
    }

    #[test]
    fn rejects_empty_token() {
        assert!(matches!(BearerAuth::new("  "), Err(CloudError::Auth(_))));
    }
}
