//! Per-run tool-execution credentials.
//!
//! Each agent run mints exactly one short-lived HS256 token scoped to the
//! requesting user. The orchestrator threads it into every tool invocation
//! as an explicit parameter; it never appears in tool schemas, model-visible
//! arguments, or logs. Tools verify it themselves, so each invocation is
//! independently authenticated even though the process is trusted end to end.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ToolError;

/// Token lifetime. Long enough for any single run, short enough to limit
/// the blast radius of a leak.
pub const DEFAULT_TTL_SECS: i64 = 300;

const PURPOSE: &str = "tool_execution";

/// An opaque signed credential. `Debug` redacts the token body.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a raw token string. Only useful for tests and external callers
    /// that transport the token out of process.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(<redacted>)")
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct Claims {
    user_id: Uuid,
    iat: i64,
    exp: i64,
    purpose: String,
}

/// Mints per-run credentials. Construct once at startup from the shared
/// secret and pass by reference into the orchestrator.
pub struct CredentialMinter {
    key: EncodingKey,
    ttl_secs: i64,
}

impl CredentialMinter {
    pub fn new(secret: &str) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    /// Override the token lifetime (mainly for expiry tests).
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Mint a fresh credential for one run on behalf of `user_id`.
    pub fn mint(&self, user_id: Uuid) -> Result<Credential, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            iat: now,
            exp: now + self.ttl_secs,
            purpose: PURPOSE.to_string(),
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.key)?;
        Ok(Credential(token))
    }
}

/// Verifies credentials inside tool handlers. Cheap to clone; every task
/// tool holds one.
#[derive(Clone)]
pub struct CredentialVerifier {
    key: DecodingKey,
}

impl CredentialVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate signature, expiry, and purpose; return the user the
    /// credential was minted for.
    pub fn verify(&self, credential: &Credential) -> Result<Uuid, ToolError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // No leeway: an expired credential is expired.
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(credential.as_str(), &self.key, &validation)
            .map_err(|e| ToolError::Authentication(format!("invalid credential: {e}")))?;
        if data.claims.purpose != PURPOSE {
            return Err(ToolError::Authentication(
                "credential was not minted for tool execution".into(),
            ));
        }
        Ok(data.claims.user_id)
    }
}
