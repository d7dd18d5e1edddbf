//! Routing decision engine.
//!
//! Maps (task kind, SLA tier, budget ceiling) to a backend:
//! 1. the SLA tier picks a preferred capability tier;
//! 2. the chain is walked from the preferred tier towards cheaper tiers and
//!    the first backend whose cost fits the ceiling wins;
//! 3. if nothing fits, the minimal-cost backend is still chosen and the plan
//!    is flagged `over_budget`.
//!
//! Task kind does not influence the choice; it is echoed in the
//! justification only.

use serde::Serialize;
use taskroute_core::{Result, SlaTier};
use tracing::debug;

use crate::catalog::{BackendCatalog, BackendTier};

/// Outcome of one routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingPlan {
    pub backend: String,
    pub preferred_backend: String,
    pub estimated_cost: i64,
    pub estimated_latency_ms: i64,
    /// The chosen backend costs more than the ceiling.
    pub over_budget: bool,
    pub justification: String,
}

/// Pure decision function over an immutable catalog.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    catalog: BackendCatalog,
}

impl DecisionEngine {
    pub fn new(catalog: BackendCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &BackendCatalog {
        &self.catalog
    }

    /// Decide from raw strings. An unknown SLA tier is `InvalidInput`.
    pub fn decide(&self, task_kind: &str, sla_tier: &str, budget_ceiling: i64) -> Result<RoutingPlan> {
        let sla: SlaTier = sla_tier.parse()?;
        Ok(self.decide_tier(task_kind, sla, budget_ceiling))
    }

    pub fn decide_tier(&self, task_kind: &str, sla: SlaTier, budget_ceiling: i64) -> RoutingPlan {
        let preferred_tier = BackendTier::preferred_for(sla);
        let preferred = self.catalog.for_tier(preferred_tier);

        let affordable = preferred_tier
            .chain_from()
            .map(|tier| self.catalog.for_tier(tier))
            .find(|b| b.cost_per_task <= budget_ceiling);

        let (chosen, over_budget) = match affordable {
            Some(b) => (b, false),
            None => (self.catalog.for_tier(BackendTier::MinimalCost), true),
        };

        let reason = if over_budget {
            format!(
                "no backend fits the ceiling; {} (cost {}) chosen anyway and flagged over budget",
                chosen.id, chosen.cost_per_task
            )
        } else if chosen.id == preferred.id {
            format!(
                "preferred backend for the SLA, cost {} within budget",
                chosen.cost_per_task
            )
        } else {
            format!(
                "fell back from {} (cost {} exceeds budget) to {} (cost {})",
                preferred.id, preferred.cost_per_task, chosen.id, chosen.cost_per_task
            )
        };

        let justification = format!(
            "Selected {} for {} task: sla_tier={}, budget_ceiling={}; {}",
            chosen.id,
            task_kind,
            sla.as_str(),
            budget_ceiling,
            reason
        );
        debug!("{}", justification);

        RoutingPlan {
            backend: chosen.id.clone(),
            preferred_backend: preferred.id.clone(),
            estimated_cost: chosen.cost_per_task,
            estimated_latency_ms: chosen.expected_latency_ms,
            over_budget,
            justification,
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(BackendCatalog::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BackendProfile;
    use taskroute_core::{Error, TaskKind};

    fn engine() -> DecisionEngine {
        DecisionEngine::default()
    }

    #[test]
    fn test_high_quality_at_exact_cost() {
        let plan = engine().decide("x", "high_quality", 40).unwrap();
        assert_eq!(plan.backend, "premium-llm");
        assert_eq!(plan.estimated_cost, 40);
        assert!(!plan.over_budget);
    }

    #[test]
    fn test_high_quality_falls_back_to_balanced() {
        let plan = engine().decide("x", "high_quality", 39).unwrap();
        assert_eq!(plan.backend, "fast-llm");
        assert_eq!(plan.preferred_backend, "premium-llm");
        assert!(plan.justification.contains("fell back from premium-llm"));

        let plan = engine().decide("x", "high_quality", 10).unwrap();
        assert_eq!(plan.backend, "fast-llm");
        assert_eq!(plan.estimated_cost, 10);
    }

    #[test]
    fn test_zero_budget_resolves_to_minimal_cost() {
        let plan = engine().decide("x", "high_quality", 0).unwrap();
        assert_eq!(plan.backend, "rules-engine");
        assert!(plan.over_budget);

        let plan = engine().decide("x", "low_latency", -25).unwrap();
        assert_eq!(plan.backend, "rules-engine");
        assert!(plan.over_budget);
    }

    #[test]
    fn test_preference_never_upgrades() {
        // A large budget does not lift low_cost above its preferred tier.
        let plan = engine().decide("summary", "low_cost", 1000).unwrap();
        assert_eq!(plan.backend, "rules-engine");
        let plan = engine().decide("summary", "low_latency", 1000).unwrap();
        assert_eq!(plan.backend, "fast-llm");
    }

    #[test]
    fn test_unknown_sla_fails_fast() {
        let err = engine().decide("summary", "cheapest", 10).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_affordable_whenever_ceiling_covers_minimal_cost() {
        let engine = engine();
        let min_cost = engine.catalog().for_tier(BackendTier::MinimalCost).cost_per_task;
        for sla in SlaTier::ALL {
            for budget in min_cost..=60 {
                let plan = engine.decide_tier("summary", sla, budget);
                assert!(plan.estimated_cost <= budget, "{:?} {}", sla, budget);
                assert!(!plan.over_budget);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let engine = engine();
        for kind in TaskKind::ALL {
            for sla in SlaTier::ALL {
                let a = engine.decide_tier(kind.as_str(), sla, 12);
                let b = engine.decide_tier(kind.as_str(), sla, 12);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_justification_echoes_inputs() {
        let plan = engine().decide("classification", "low_latency", 15).unwrap();
        assert!(plan.justification.starts_with("Selected fast-llm"));
        assert!(plan.justification.contains("classification"));
        assert!(plan.justification.contains("sla_tier=low_latency"));
        assert!(plan.justification.contains("budget_ceiling=15"));
    }

    #[test]
    fn test_alternate_catalog() {
        let catalog = BackendCatalog::new(vec![
            BackendProfile {
                id: "big".into(),
                tier: BackendTier::HighQuality,
                cost_per_task: 5,
                expected_latency_ms: 100,
            },
            BackendProfile {
                id: "mid".into(),
                tier: BackendTier::Balanced,
                cost_per_task: 3,
                expected_latency_ms: 50,
            },
            BackendProfile {
                id: "tiny".into(),
                tier: BackendTier::MinimalCost,
                cost_per_task: 1,
                expected_latency_ms: 5,
            },
        ])
        .unwrap();
        let engine = DecisionEngine::new(catalog);
        let plan = engine.decide_tier("summary", SlaTier::HighQuality, 5);
        assert_eq!(plan.backend, "big");
        assert_eq!(plan.estimated_latency_ms, 100);
    }
}
