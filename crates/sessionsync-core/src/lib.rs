//! SessionSync Core - Console models, device records, classification and registry
//!
//! This crate provides the foundational types for console discovery:
//! - Console model catalog (X32/M32 and Wing families)
//! - Device records with explicit verification state
//! - Ordered pattern classifier mapping free text to a console model
//! - Deduplicated device registry with idempotent merge semantics

pub mod classify;
pub mod device;
pub mod model;
pub mod registry;

pub use classify::{Classification, ClassificationRule, Classifier, ClassifierError, Confidence};
pub use device::{DeviceId, DeviceRecord, DiscoveryMethod, VerificationState};
pub use model::{ConsoleModel, Family};
pub use registry::{Registry, UpsertOutcome};
