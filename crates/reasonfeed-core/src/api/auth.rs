//! Bearer-token source for outgoing requests.
//!
//! Sign-in and token refresh live outside this crate; the engine only asks
//! for the current token right before each request.

use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;

/// Supplies the bearer token attached to every request.
pub trait AuthProvider: Send + Sync {
    /// Returns the current token, if any. `None` still lets the request go
    /// out; the server is the final authority on access.
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token resolved once from config or environment.
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

impl AuthProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Adds `Authorization: Bearer <token>` when the provider has a token.
pub(crate) fn with_auth(builder: RequestBuilder, auth: &dyn AuthProvider) -> RequestBuilder {
    match auth.bearer_token() {
        Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_static_token_counts_as_missing() {
        assert_eq!(StaticToken::new(Some("  ".to_string())).bearer_token(), None);
        assert_eq!(
            StaticToken::new(Some("abc".to_string())).bearer_token(),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_with_auth_sets_header_only_with_token() {
        let client = reqwest::Client::new();

        let request = with_auth(
            client.get("http://localhost/x"),
            &StaticToken::new(Some("abc".to_string())),
        )
        .build()
        .unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer abc"
        );

        let request = with_auth(client.get("http://localhost/x"), &StaticToken::default())
            .build()
            .unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }
}
