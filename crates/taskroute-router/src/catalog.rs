//! Backend catalog — cost and latency profile of each execution backend.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use taskroute_core::{Error, Result, SlaTier};
use tracing::info;

/// Capability tier of a backend, in descending order of capability and cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTier {
    HighQuality,
    Balanced,
    MinimalCost,
}

impl BackendTier {
    /// The fixed fallback chain, most capable first.
    pub const CHAIN: [BackendTier; 3] = [Self::HighQuality, Self::Balanced, Self::MinimalCost];

    /// Preferred tier for an SLA.
    pub fn preferred_for(sla: SlaTier) -> Self {
        match sla {
            SlaTier::HighQuality => Self::HighQuality,
            SlaTier::LowLatency => Self::Balanced,
            SlaTier::LowCost => Self::MinimalCost,
        }
    }

    /// This tier and every cheaper one, in chain order.
    pub fn chain_from(self) -> impl Iterator<Item = BackendTier> {
        Self::CHAIN.into_iter().skip_while(move |t| *t != self)
    }
}

/// Static profile of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendProfile {
    pub id: String,
    pub tier: BackendTier,
    #[serde(rename = "costPerTask")]
    pub cost_per_task: i64,
    #[serde(rename = "expectedLatencyMs")]
    pub expected_latency_ms: i64,
}

/// Read-only registry of backends, one per tier.
#[derive(Debug, Clone, Serialize)]
pub struct BackendCatalog {
    backends: Vec<BackendProfile>,
}

impl BackendCatalog {
    /// Build a catalog, validating that every tier has exactly one backend.
    pub fn new(mut backends: Vec<BackendProfile>) -> Result<Self> {
        let mut ids = HashSet::new();
        for b in &backends {
            if b.id.trim().is_empty() {
                return Err(Error::Config("backend id must not be empty".into()));
            }
            if !ids.insert(b.id.as_str()) {
                return Err(Error::Config(format!("duplicate backend id '{}'", b.id)));
            }
            if b.cost_per_task < 0 || b.expected_latency_ms < 0 {
                return Err(Error::Config(format!(
                    "backend '{}' has a negative cost or latency",
                    b.id
                )));
            }
        }
        for tier in BackendTier::CHAIN {
            let n = backends.iter().filter(|b| b.tier == tier).count();
            if n != 1 {
                return Err(Error::Config(format!(
                    "catalog needs exactly one {:?} backend, found {}",
                    tier, n
                )));
            }
        }
        backends.sort_by_key(|b| b.tier);
        Ok(Self { backends })
    }

    /// Load a catalog override from a JSON array of profiles.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let backends: Vec<BackendProfile> = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("invalid catalog {}: {}", path.display(), e)))?;
        let catalog = Self::new(backends)?;
        info!("Loaded backend catalog from {}", path.display());
        Ok(catalog)
    }

    /// The override at `path` if it exists, otherwise the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_json_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn get(&self, id: &str) -> Option<&BackendProfile> {
        self.backends.iter().find(|b| b.id == id)
    }

    pub fn for_tier(&self, tier: BackendTier) -> &BackendProfile {
        // `new` guarantees one backend per tier.
        self.backends
            .iter()
            .find(|b| b.tier == tier)
            .unwrap_or(&self.backends[0])
    }

    /// All backends, most capable first.
    pub fn backends(&self) -> &[BackendProfile] {
        &self.backends
    }
}

impl Default for BackendCatalog {
    fn default() -> Self {
        Self {
            backends: vec![
                BackendProfile {
                    id: "premium-llm".into(),
                    tier: BackendTier::HighQuality,
                    cost_per_task: 40,
                    expected_latency_ms: 2400,
                },
                BackendProfile {
                    id: "fast-llm".into(),
                    tier: BackendTier::Balanced,
                    cost_per_task: 10,
                    expected_latency_ms: 600,
                },
                BackendProfile {
                    id: "rules-engine".into(),
                    tier: BackendTier::MinimalCost,
                    cost_per_task: 1,
                    expected_latency_ms: 40,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, tier: BackendTier, cost: i64) -> BackendProfile {
        BackendProfile {
            id: id.into(),
            tier,
            cost_per_task: cost,
            expected_latency_ms: 100,
        }
    }

    #[test]
    fn test_default_catalog_order() {
        let catalog = BackendCatalog::default();
        let costs: Vec<i64> = catalog.backends().iter().map(|b| b.cost_per_task).collect();
        assert_eq!(costs, vec![40, 10, 1]);
        assert_eq!(catalog.for_tier(BackendTier::Balanced).id, "fast-llm");
        assert!(catalog.get("rules-engine").is_some());
        assert!(catalog.get("gpt-unknown").is_none());
    }

    #[test]
    fn test_chain_from() {
        let chain: Vec<_> = BackendTier::Balanced.chain_from().collect();
        assert_eq!(chain, vec![BackendTier::Balanced, BackendTier::MinimalCost]);
        assert_eq!(BackendTier::HighQuality.chain_from().count(), 3);
    }

    #[test]
    fn test_new_sorts_and_validates() {
        let catalog = BackendCatalog::new(vec![
            profile("c", BackendTier::MinimalCost, 2),
            profile("a", BackendTier::HighQuality, 90),
            profile("b", BackendTier::Balanced, 20),
        ])
        .unwrap();
        assert_eq!(catalog.backends()[0].id, "a");

        let missing = BackendCatalog::new(vec![
            profile("a", BackendTier::HighQuality, 90),
            profile("b", BackendTier::Balanced, 20),
        ]);
        assert!(matches!(missing, Err(Error::Config(_))));

        let dup = BackendCatalog::new(vec![
            profile("a", BackendTier::HighQuality, 90),
            profile("a", BackendTier::Balanced, 20),
            profile("c", BackendTier::MinimalCost, 2),
        ]);
        assert!(matches!(dup, Err(Error::Config(_))));
    }

    #[test]
    fn test_json_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backends.json");
        assert_eq!(BackendCatalog::load_or_default(&path).unwrap().backends().len(), 3);

        std::fs::write(
            &path,
            r#"[
                {"id": "big", "tier": "high_quality", "costPerTask": 100, "expectedLatencyMs": 5000},
                {"id": "mid", "tier": "balanced", "costPerTask": 25, "expectedLatencyMs": 900},
                {"id": "regex", "tier": "minimal_cost", "costPerTask": 0, "expectedLatencyMs": 5}
            ]"#,
        )
        .unwrap();
        let catalog = BackendCatalog::load_or_default(&path).unwrap();
        assert_eq!(catalog.for_tier(BackendTier::HighQuality).id, "big");

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(BackendCatalog::from_json_file(&path), Err(Error::Config(_))));
    }
}
