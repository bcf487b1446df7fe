//! # policyship-sync
//!
//! Delivery reconciliation engine.
//!
//! A run goes detect → filter → (probe) → validate → publish → record:
//!
//! 1. [`policyship_detector::detect`] lists artifacts changed since the baseline.
//! 2. [`eligibility::filter`] skips ids that already have a delivery record.
//! 3. Pending artifacts fan out to a bounded worker pool; each worker runs
//!    [`probe::probe`], the [`Validator`], the [`Packager`] and
//!    [`publisher::publish`] independently.
//! 4. [`merge::next_ledger`] unions new delivery records into the ledger and
//!    advances the baseline only when nothing failed.
//!
//! Call [`Reconciler::run`] for a full run, or [`pipeline`] to build one from
//! a repository's `.policyship.yaml`.

pub mod eligibility;
pub mod error;
pub mod merge;
pub mod outcome;
pub mod packager;
pub mod pipeline;
mod pool;
pub mod probe;
pub mod publisher;
pub mod reconciler;
pub mod registry;
pub mod summary;
pub mod validator;

pub use error::{PackageError, ReconcileError, TransportError};
pub use outcome::{ArtifactStatus, DeliveryPath, RunOutcome};
pub use packager::{ManifestPackager, Packager};
pub use reconciler::{
    plan, Collaborators, Plan, Reconciler, RunOptions, RunReport, StatusCounts, Verdict,
};
pub use registry::{HttpRegistry, HttpReply, PublishRequest, RegistryClient};
pub use validator::{
    ChainValidator, CommandValidator, StructureValidator, ValidationReport, Validator,
};
