//! Artifact registry seam and its HTTP implementation.
//!
//! The registry is external and authoritative. Every call is bounded by the
//! agent timeout; a call that produces no HTTP status surfaces as a
//! [`TransportError`], which callers fold into a per-artifact outcome.

use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use policyship_core::ArtifactId;

use crate::error::TransportError;

/// Header carrying the per-artifact idempotency key on publish.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Environment variable holding an optional bearer token.
pub const TOKEN_ENV: &str = "POLICYSHIP_REGISTRY_TOKEN";

/// Stable idempotency key for `id`: hex SHA-256 of its canonical string.
///
/// Retries of the same artifact always send the same key.
pub fn idempotency_key(id: &ArtifactId) -> String {
    hex::encode(Sha256::digest(id.to_string().as_bytes()))
}

/// Status and body of a registry response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One publish call.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub id: ArtifactId,
    pub idempotency_key: String,
    pub body: Value,
}

impl PublishRequest {
    pub fn new(id: ArtifactId, body: Value) -> Self {
        let idempotency_key = idempotency_key(&id);
        Self {
            id,
            idempotency_key,
            body,
        }
    }
}

/// Registry operations used during a run.
pub trait RegistryClient: Send + Sync {
    /// Existence check for `id`. Returns the HTTP status.
    fn lookup(&self, id: &ArtifactId) -> Result<u16, TransportError>;

    /// Publish call. Returns the HTTP status and body.
    fn submit(&self, request: &PublishRequest) -> Result<HttpReply, TransportError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`RegistryClient`] speaking JSON over HTTP.
///
/// - lookup: `GET {base}/artifacts/{name}/{version}`
/// - publish: `POST {base}/artifacts` with an [`IDEMPOTENCY_HEADER`]
pub struct HttpRegistry {
    base_url: String,
    agent: ureq::Agent,
    token: Option<String>,
}

impl HttpRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` on every call.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// `{base}/<segments…>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<String, TransportError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::new(&self.base_url, format!("invalid registry URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| TransportError::new(&self.base_url, "registry URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    fn lookup_url(&self, id: &ArtifactId) -> Result<String, TransportError> {
        let version = id.version.to_string();
        self.endpoint(&["artifacts", &id.name, &version])
    }

    fn publish_url(&self) -> Result<String, TransportError> {
        self.endpoint(&["artifacts"])
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }
}

/// Turn a ureq result into a reply, keeping non-2xx statuses as data.
fn into_reply(
    target: &str,
    result: Result<ureq::Response, ureq::Error>,
) -> Result<HttpReply, TransportError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            return Err(TransportError::new(target, transport.to_string()));
        }
    };
    let status = response.status();
    let body = response
        .into_string()
        .map_err(|e| TransportError::new(target, format!("reading response body: {e}")))?;
    Ok(HttpReply { status, body })
}

impl RegistryClient for HttpRegistry {
    fn lookup(&self, id: &ArtifactId) -> Result<u16, TransportError> {
        let url = self.lookup_url(id)?;
        tracing::debug!(%url, "registry lookup");
        let result = self.authorize(self.agent.get(&url)).call();
        into_reply(&url, result).map(|reply| reply.status)
    }

    fn submit(&self, request: &PublishRequest) -> Result<HttpReply, TransportError> {
        let url = self.publish_url()?;
        tracing::debug!(%url, artifact = %request.id, "registry publish");
        let result = self
            .authorize(self.agent.post(&url))
            .set(IDEMPOTENCY_HEADER, &request.idempotency_key)
            .send_json(&request.body);
        into_reply(&url, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_per_id() {
        let a: ArtifactId = "policies/a/v1.0.0".parse().unwrap();
        let b: ArtifactId = "policies/a/v1.0.1".parse().unwrap();
        assert_eq!(idempotency_key(&a), idempotency_key(&a.clone()));
        assert_ne!(idempotency_key(&a), idempotency_key(&b));
        assert_eq!(idempotency_key(&a).len(), 64);
    }

    #[test]
    fn urls_use_v_prefixed_version_and_trim_trailing_slash() {
        let registry = HttpRegistry::new("http://reg.local/api/", Duration::from_secs(1));
        let id: ArtifactId = "policies/rate-limiter/v1.0.6".parse().unwrap();
        assert_eq!(
            registry.lookup_url(&id).unwrap(),
            "http://reg.local/api/artifacts/rate-limiter/v1.0.6"
        );
        assert_eq!(registry.publish_url().unwrap(), "http://reg.local/api/artifacts");
    }

    #[test]
    fn name_segment_is_percent_encoded() {
        let registry = HttpRegistry::new("http://reg.local", Duration::from_secs(1));
        let id: ArtifactId = "policies/rate limiter#2?x/v1.0.0".parse().unwrap();
        assert_eq!(
            registry.lookup_url(&id).unwrap(),
            "http://reg.local/artifacts/rate%20limiter%232%3Fx/v1.0.0"
        );
        assert_eq!(registry.publish_url().unwrap(), "http://reg.local/artifacts");
    }

    #[test]
    fn unparseable_base_url_is_a_transport_error() {
        let registry = HttpRegistry::new("not a url", Duration::from_secs(1));
        let id: ArtifactId = "policies/a/v1.0.0".parse().unwrap();
        let err = registry.lookup(&id).unwrap_err();
        assert!(err.message.contains("invalid registry URL"), "{err}");
    }

    #[test]
    fn blank_token_is_ignored() {
        let registry =
            HttpRegistry::new("http://x", Duration::from_secs(1)).with_token(Some("  ".into()));
        assert!(registry.token.is_none());
    }
}
