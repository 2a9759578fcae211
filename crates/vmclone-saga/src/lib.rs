//! Compensation ledger for multi-step provisioning.
//!
//! A saga executes steps that create external resources. Every successful
//! step appends the resource it created to a [`CompensationLedger`]; on
//! failure the ledger is consumed in reverse order (LIFO) and each resource is
//! compensated. Compensation is best-effort: a failing compensation is
//! reported and the remaining entries are still processed.

mod audit;
mod error;
mod ledger;
mod step;

pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use error::CompensationError;
pub use ledger::CompensationLedger;
pub use step::SagaStep;
