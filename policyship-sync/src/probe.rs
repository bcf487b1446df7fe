//! Existence probe, the self-healing step.
//!
//! A prior run may have published an artifact and then died before the ledger
//! was written. The probe finds such artifacts so they are recorded instead
//! of republished. It fails open: anything but a clear answer falls through
//! to the normal validate/publish path.

use policyship_core::ArtifactId;

use crate::registry::RegistryClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// 2xx: the version is already in the registry.
    Exists,
    /// 404.
    NotFound,
    /// Any other status or a transport failure.
    Unknown(String),
}

pub fn probe(registry: &dyn RegistryClient, id: &ArtifactId) -> ProbeResult {
    match registry.lookup(id) {
        Ok(status) if (200..300).contains(&status) => ProbeResult::Exists,
        Ok(404) => ProbeResult::NotFound,
        Ok(status) => {
            tracing::warn!(artifact = %id, status, "existence probe inconclusive; continuing");
            ProbeResult::Unknown(format!("probe returned HTTP {status}"))
        }
        Err(e) => {
            tracing::warn!(artifact = %id, error = %e, "existence probe failed; continuing");
            ProbeResult::Unknown(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::registry::{HttpReply, PublishRequest};
    use rstest::rstest;

    struct Fixed(Result<u16, TransportError>);

    impl RegistryClient for Fixed {
        fn lookup(&self, _: &ArtifactId) -> Result<u16, TransportError> {
            self.0.clone()
        }
        fn submit(&self, _: &PublishRequest) -> Result<HttpReply, TransportError> {
            unreachable!("probe never publishes")
        }
    }

    fn id() -> ArtifactId {
        "policies/a/v1.0.0".parse().unwrap()
    }

    #[rstest]
    #[case(200, Some(ProbeResult::Exists))]
    #[case(204, Some(ProbeResult::Exists))]
    #[case(404, Some(ProbeResult::NotFound))]
    #[case(401, None)]
    #[case(500, None)]
    fn maps_statuses(#[case] status: u16, #[case] expected: Option<ProbeResult>) {
        let got = probe(&Fixed(Ok(status)), &id());
        match expected {
            Some(expected) => assert_eq!(got, expected),
            None => assert!(matches!(got, ProbeResult::Unknown(_)), "{status}: {got:?}"),
        }
    }

    #[test]
    fn transport_error_fails_open() {
        let registry = Fixed(Err(TransportError::new("http://x", "timed out")));
        let ProbeResult::Unknown(detail) = probe(&registry, &id()) else {
            panic!("expected Unknown");
        };
        assert!(detail.contains("timed out"));
    }
}
