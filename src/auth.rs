//! Request authorization.
//!
//! Access is a pure decision per request: a method listed as public for the
//! request's granularity is always allowed, anything else needs the
//! administrator [`Credential`]. There are no sessions or tokens.
//!
//! This is a placeholder scheme. Credentials travel in HTTP Basic headers
//! and are compared against a single configured pair; do not rely on it in
//! production.

use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::ApiError;
use crate::types::{Granularity, Method};

/// Username/password pair presented with a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode an `Authorization: Basic ...` header value.
    ///
    /// Returns `None` for other schemes and for malformed payloads.
    pub fn from_basic_header(value: &str) -> Option<Self> {
        let encoded = value
            .strip_prefix("Basic ")
            .or_else(|| value.strip_prefix("basic "))?
            .trim();
        let decoded = BASE64_STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Credential::new(username, password))
    }

    /// Encode as an `Authorization` header value.
    pub fn to_basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64_STANDARD.encode(raw))
    }

    /// Constant-time comparison of both fields.
    pub fn verify(&self, presented: &Credential) -> bool {
        let username = self.username.as_bytes().ct_eq(presented.username.as_bytes());
        let password = self.password.as_bytes().ct_eq(presented.password.as_bytes());
        (username & password).into()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which methods a resource accepts and which of them need no credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Methods enabled on the collection endpoint.
    pub resource_methods: Vec<Method>,
    /// Methods enabled on item endpoints.
    pub item_methods: Vec<Method>,
    /// Collection methods open to anonymous callers.
    pub public_methods: Vec<Method>,
    /// Item methods open to anonymous callers.
    pub public_item_methods: Vec<Method>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            resource_methods: vec![Method::Get, Method::Post, Method::Delete],
            item_methods: vec![Method::Get, Method::Patch, Method::Delete],
            public_methods: vec![Method::Get],
            public_item_methods: vec![Method::Get],
        }
    }
}

impl AccessPolicy {
    /// Whether the method is routed at all for this granularity.
    pub fn is_enabled(&self, method: Method, granularity: Granularity) -> bool {
        match granularity {
            Granularity::Collection => self.resource_methods.contains(&method),
            Granularity::Item => self.item_methods.contains(&method),
        }
    }

    pub fn is_public(&self, method: Method, granularity: Granularity) -> bool {
        match granularity {
            Granularity::Collection => self.public_methods.contains(&method),
            Granularity::Item => self.public_item_methods.contains(&method),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Decides per request whether the caller may proceed.
#[derive(Debug, Clone)]
pub struct Authorizer {
    admin: Credential,
    policy: AccessPolicy,
}

impl Authorizer {
    pub fn new(admin: Credential, policy: AccessPolicy) -> Self {
        Self { admin, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn decide(
        &self,
        credential: Option<&Credential>,
        resource: &str,
        method: Method,
        granularity: Granularity,
    ) -> Decision {
        if self.policy.is_public(method, granularity) {
            return Decision::Allow;
        }

        match credential {
            Some(presented) if self.admin.verify(presented) => Decision::Allow,
            Some(presented) => {
                debug!(resource, %method, username = %presented.username, "credential rejected");
                Decision::Deny
            }
            None => {
                debug!(resource, %method, "no credential presented");
                Decision::Deny
            }
        }
    }

    /// Like [`decide`](Self::decide), mapping a denial to `Unauthorized`.
    pub fn authorize(
        &self,
        credential: Option<&Credential>,
        resource: &str,
        method: Method,
        granularity: Granularity,
    ) -> Result<(), ApiError> {
        match self.decide(credential, resource, method, granularity) {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(ApiError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer() -> Authorizer {
        Authorizer::new(Credential::new("admin", "secret"), AccessPolicy::default())
    }

    #[test]
    fn basic_header_round_trip() {
        let credential = Credential::new("admin", "se:cret");
        let header = credential.to_basic_header();
        assert_eq!(Credential::from_basic_header(&header), Some(credential));
    }

    #[test]
    fn basic_header_known_value() {
        // "user:pass"
        let credential = Credential::from_basic_header("Basic dXNlcjpwYXNz").unwrap();
        assert_eq!(credential, Credential::new("user", "pass"));
    }

    #[test]
    fn malformed_headers_yield_none() {
        assert_eq!(Credential::from_basic_header("Bearer abc"), None);
        assert_eq!(Credential::from_basic_header("Basic !!!"), None);
        // base64 of "nocolon"
        assert_eq!(Credential::from_basic_header("Basic bm9jb2xvbg=="), None);
        assert_eq!(Credential::from_basic_header(""), None);
    }

    #[test]
    fn debug_redacts_password() {
        let out = format!("{:?}", Credential::new("admin", "secret"));
        assert!(!out.contains("secret"));
    }

    #[test]
    fn public_get_needs_no_credential() {
        let authz = authorizer();
        for granularity in [Granularity::Collection, Granularity::Item] {
            assert_eq!(
                authz.decide(None, "chemicals", Method::Get, granularity),
                Decision::Allow
            );
        }
    }

    #[test]
    fn writes_denied_without_admin_credential() {
        let authz = authorizer();
        let wrong = [
            None,
            Some(Credential::new("nope", "nope")),
            Some(Credential::new("admin", "nope")),
            Some(Credential::new("nope", "secret")),
            Some(Credential::new("admin", "secret ")),
            Some(Credential::new("", "")),
        ];
        for credential in &wrong {
            for (method, granularity) in [
                (Method::Post, Granularity::Collection),
                (Method::Delete, Granularity::Collection),
                (Method::Patch, Granularity::Item),
                (Method::Delete, Granularity::Item),
            ] {
                assert_eq!(
                    authz.decide(credential.as_ref(), "chemicals", method, granularity),
                    Decision::Deny,
                    "{:?} {} should be denied",
                    credential,
                    method
                );
            }
        }
    }

    #[test]
    fn admin_credential_allows_everything() {
        let authz = authorizer();
        let admin = Credential::new("admin", "secret");
        for method in [Method::Get, Method::Post, Method::Patch, Method::Delete] {
            for granularity in [Granularity::Collection, Granularity::Item] {
                assert_eq!(
                    authz.decide(Some(&admin), "chemicals", method, granularity),
                    Decision::Allow
                );
            }
        }
    }

    #[test]
    fn authorize_maps_deny_to_unauthorized() {
        let authz = authorizer();
        let result = authz.authorize(None, "chemicals", Method::Post, Granularity::Collection);
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn default_policy_routes() {
        let policy = AccessPolicy::default();
        assert!(policy.is_enabled(Method::Post, Granularity::Collection));
        assert!(!policy.is_enabled(Method::Patch, Granularity::Collection));
        assert!(policy.is_enabled(Method::Patch, Granularity::Item));
        assert!(!policy.is_enabled(Method::Post, Granularity::Item));
    }
}
