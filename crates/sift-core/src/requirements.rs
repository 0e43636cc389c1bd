use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum points allocable to each scoring factor.
///
/// Pools are requirement-spec data, not code: a spec can reweight the
/// factors without touching the engine. Defaults follow the
/// skills-heavy 50/20/20/10 split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorPools {
    pub required_skills: f64,
    pub preferred_skills: f64,
    pub experience: f64,
    pub education: f64,
}

impl Default for FactorPools {
    fn default() -> Self {
        Self {
            required_skills: 50.0,
            preferred_skills: 20.0,
            experience: 20.0,
            education: 10.0,
        }
    }
}

impl FactorPools {
    /// Total points available across all factors.
    pub fn max_score(&self) -> f64 {
        self.required_skills + self.preferred_skills + self.experience + self.education
    }
}

/// A named, versioned requirement specification a profile is scored against.
///
/// Loaded by natural key (`requirements_id`) from configuration; read-only
/// at scoring time. Skill weights use `BTreeMap` so iteration order, and
/// therefore scoring output, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementSpec {
    pub position: String,
    /// Skill name → relative weight. A matched skill earns its
    /// weight-proportional share of the required pool.
    pub required_skills: BTreeMap<String, f64>,
    /// Nice-to-have skills scored against their own smaller pool.
    /// Missing preferred skills are never penalized.
    pub preferred_skills: BTreeMap<String, f64>,
    pub min_experience_years: f64,
    /// Acceptable degree levels as free text ("Bachelor", "S1", ...).
    /// Empty means no education requirement.
    pub education_level: Vec<String>,
    pub pools: FactorPools,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pools_sum_to_100() {
        assert_eq!(FactorPools::default().max_score(), 100.0);
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: RequirementSpec = serde_json::from_str(
            r#"{
                "position": "Backend Engineer",
                "required_skills": {"Python": 3, "Go": 1},
                "min_experience_years": 2
            }"#,
        )
        .unwrap();
        assert_eq!(spec.position, "Backend Engineer");
        assert_eq!(spec.required_skills.len(), 2);
        assert!(spec.preferred_skills.is_empty());
        assert!(spec.education_level.is_empty());
        assert_eq!(spec.pools, FactorPools::default());
    }

    #[test]
    fn test_spec_pools_overridable() {
        let spec: RequirementSpec = serde_json::from_str(
            r#"{"pools": {"required_skills": 30, "preferred_skills": 10,
                 "experience": 40, "education": 20}}"#,
        )
        .unwrap();
        assert_eq!(spec.pools.max_score(), 100.0);
        assert_eq!(spec.pools.experience, 40.0);
    }

    #[test]
    fn test_required_skills_iterate_in_name_order() {
        let spec: RequirementSpec = serde_json::from_str(
            r#"{"required_skills": {"Zig": 1, "Ada": 2, "Go": 3}}"#,
        )
        .unwrap();
        let names: Vec<&str> = spec.required_skills.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Ada", "Go", "Zig"]);
    }
}
