//! Publish step and its normalization into a delivery outcome.
//!
//! A 409 means the registry already holds this version, which is the same end
//! state as a successful publish. Both become `delivered`.

use crate::outcome::DeliveryPath;
use crate::registry::{PublishRequest, RegistryClient};

/// Longest registry body excerpt kept in a failure reason.
const BODY_EXCERPT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResult {
    Delivered,
    Conflict,
    Failed(String),
}

impl PublishResult {
    /// `Delivered` and `Conflict` both count as delivered.
    pub fn into_delivery(self) -> Result<DeliveryPath, String> {
        match self {
            PublishResult::Delivered => Ok(DeliveryPath::Published),
            PublishResult::Conflict => Ok(DeliveryPath::Conflict),
            PublishResult::Failed(reason) => Err(reason),
        }
    }
}

pub fn publish(registry: &dyn RegistryClient, request: &PublishRequest) -> PublishResult {
    let reply = match registry.submit(request) {
        Ok(reply) => reply,
        Err(e) => return PublishResult::Failed(e.to_string()),
    };
    if reply.is_success() {
        return PublishResult::Delivered;
    }
    match reply.status {
        409 => {
            tracing::info!(artifact = %request.id, "registry reports version already exists");
            PublishResult::Conflict
        }
        status => {
            let body = reply.body.trim();
            let reason = if body.is_empty() {
                format!("registry returned HTTP {status}")
            } else {
                let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
                format!("registry returned HTTP {status}: {excerpt}")
            };
            PublishResult::Failed(reason)
        }
    }
}
