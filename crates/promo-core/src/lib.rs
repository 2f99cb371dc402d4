//! Asynchronous marketing-content generation: task registry, session replay,
//! a bounded worker pool, and the hosted-model collaborators it drives.

mod runtime;

pub mod services;

pub use runtime::orchestrator::{Generators, INTERNAL_FAILURE, Orchestrator, OrchestratorConfig};
pub use runtime::params::{MarketingParams, Platforms, REQUIRED_FIELDS};
pub use runtime::retry::{RetryPolicy, Transient, retry};
pub use runtime::session::{DEFAULT_SESSION_TIMEOUT, MemorySessionStore, Session, SessionStore};
pub use runtime::storage::{MemoryTaskStore, TaskStore};
pub use runtime::types::{
    ImageSlot, MarketingCopy, OverallStatus, RuntimeError, Stage, StageStatus, StatusReport,
    TaskResult, TaskSnapshot, TaskStatus, TaskToken,
};
