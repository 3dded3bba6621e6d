#![forbid(unsafe_code)]

pub mod engine;

pub use engine::{
    AggregatedAssignment, AggregationStore, AssignmentEngine, DiffTracker, EngineHandle,
    EngineStatus, EngineStorage, MembershipDiff,
};
