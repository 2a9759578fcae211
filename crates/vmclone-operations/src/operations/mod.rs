mod clone;
mod property_update;

pub use clone::{
    CloneInput, CloneLedger, CloneOperation, CloneOutput, CloneRequest, CloneSagaContext,
    CreateCloneStep, CreateSnapshotStep, SnapshotCloneStep,
};
pub use property_update::PropertyUpdateEngine;
