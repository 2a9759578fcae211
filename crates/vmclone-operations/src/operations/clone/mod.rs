mod context;
mod ledger;
mod operation;
mod steps;

pub use context::CloneSagaContext;
pub use ledger::{CloneLedger, SnapshotCloneStep};
pub use operation::{CloneInput, CloneOperation, CloneOutput};
pub use steps::{CloneRequest, CreateCloneStep, CreateSnapshotStep};
