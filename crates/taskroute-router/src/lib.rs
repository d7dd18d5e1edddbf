//! TaskRoute Router — backend catalog and the routing decision engine.
//!
//! The engine is a pure function of (task kind, SLA tier, budget ceiling)
//! over a catalog injected at construction, so every decision can be
//! reproduced from the audit trail alone.

pub mod catalog;
pub mod decision;

pub use catalog::{BackendCatalog, BackendProfile, BackendTier};
pub use decision::{DecisionEngine, RoutingPlan};
