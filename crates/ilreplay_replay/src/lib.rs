//! ilreplay Replay Engine
//!
//! Drives a recorded IL builder log back through an [`IlBuilderApi`]
//! implementation, rebuilding the same call sequence with every ID resolved
//! to the object the replay produced for it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod diff;
pub mod dispatch;
pub mod engine;
pub mod phase;
pub mod registry;
pub mod state;
pub mod statement;

pub use api::{
    BinaryOp, BuilderRef, ForLoopArgs, FunctionSignature, IlBuilderApi, LoopExits, TypeRef,
    ValueRef,
};
pub use diff::{DiffEngine, DiffReport, DiffResult, Divergence, Section};
pub use engine::{ReplayConfig, ReplayEngine, ReplayOutcome, ReplaySummary};
pub use phase::PhaseMachine;
pub use registry::{Handle, RebindPolicy, Registry, RegistryKey};
pub use state::{Op, Operand, ReconstructedMethod, ReferenceBuilder};
pub use statement::StatementKind;
