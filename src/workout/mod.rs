//! Run sessions and structured workout plans.

pub mod executor;
pub mod plan;
pub mod session;

pub use executor::{ExecutorStatus, PlanExecutor};
pub use plan::{Plan, Segment};
pub use session::Session;
