//! Batch record provisioning: parse a free-text list of identifiers, provision each one
//! against an injected [`ProvisioningService`], and aggregate the outcomes into a report.

pub mod batch;
pub mod error;
pub mod identifier;
pub mod membership;
pub mod outcome;
pub mod parser;
pub mod processor;
pub mod report;
pub mod result;
pub mod rows;
pub mod service;

pub use batch::{
    BatchRequest, BatchRun, BatchRunner, BatchSettings, ItemOverride, MissingPolicy, TargetConfig,
};
pub use error::{ProvisioningError, ServiceError};
pub use identifier::Identifier;
pub use outcome::{ItemResult, OutcomeStatus, ProcessingOutcome};
pub use parser::{parse_identifiers, parse_with_report, ParseReport};
pub use result::{BatchResult, Diagnostic, ResultAggregator};
pub use rows::{parse_user_csv, user_rows_request, UserRow};
pub use service::{
    Certification, CreateResult, Entitlement, ExistingRecord, LinkTarget, Lookup,
    MembershipTier, ProvisioningService, RecordAttributes, RecordId, TrackSource,
};
