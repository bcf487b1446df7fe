//! Policyship core library: domain types, ledger persistence, configuration.
//!
//! - [`types`]: artifact identity, commit refs, delivery records
//! - [`ledger`]: baseline pointer + delivery map, load / atomic save
//! - [`config`]: `.policyship.yaml` loading
//! - [`error`]: [`LedgerError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod ledger;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, LedgerError};
pub use ledger::Ledger;
pub use types::{
    ArtifactId, ArtifactVersion, ChangeRecord, CommitRef, DeliveryRecord, IdParseError,
    ReleaseTag,
};
