//! Deterministic multi-factor profile scoring.
//!
//! `score(profile, spec)` is a pure function: no I/O, no clock, no
//! randomness. Identical inputs produce byte-identical serialized
//! output. Requirement skills live in a `BTreeMap`, candidate ties
//! break on maximum similarity, and every emitted number is rounded
//! the same way on every call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::profile::ProfileRecord;
use crate::requirements::RequirementSpec;
use crate::similarity::{SIMILARITY_THRESHOLD, best_match};

/// Degree keyword → ordinal level, high school (1) through doctoral (5).
/// Includes the localized degree names the extractor encounters.
const EDUCATION_LEVELS: &[(&str, u32)] = &[
    ("high school", 1),
    ("sma", 1),
    ("smk", 1),
    ("diploma", 2),
    ("associate", 2),
    ("d3", 2),
    ("bachelor", 3),
    ("s1", 3),
    ("sarjana", 3),
    ("master", 4),
    ("s2", 4),
    ("mba", 4),
    ("doctoral", 5),
    ("phd", 5),
    ("s3", 5),
];

static YEARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*yr").expect("years regex"));
static MONTHS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*mo").expect("months regex"));

/// Final score for one (profile, requirement spec) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub breakdown: ScoreBreakdown,
    pub recommendation: String,
}

/// Per-factor audit trail: enough detail to reconstruct every awarded
/// point by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skills: SkillsBreakdown,
    pub experience: ExperienceBreakdown,
    pub education: EducationBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsBreakdown {
    pub score: f64,
    pub max_score: f64,
    pub required: SkillPoolBreakdown,
    pub preferred: SkillPoolBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillPoolBreakdown {
    pub score: f64,
    pub max_score: f64,
    pub matches: Vec<SkillMatch>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub skill: String,
    pub matched_with: String,
    pub similarity: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceBreakdown {
    pub score: f64,
    pub max_score: f64,
    pub total_years: f64,
    pub required_years: f64,
    pub meets_requirement: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationBreakdown {
    pub score: f64,
    pub max_score: f64,
    pub profile_degrees: Vec<String>,
    pub required_levels: Vec<String>,
    pub meets_requirement: bool,
}

/// Scores profiles against one requirement spec.
pub struct Scorer {
    spec: RequirementSpec,
}

impl Scorer {
    pub fn new(spec: RequirementSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &RequirementSpec {
        &self.spec
    }

    /// Score a profile. Pure and deterministic.
    pub fn score(&self, profile: &ProfileRecord) -> ScoreResult {
        let profile_skills = profile.normalized_skills();
        let pools = &self.spec.pools;

        let required = score_skill_pool(
            &self.spec.required_skills,
            &profile_skills,
            pools.required_skills,
        );
        let preferred = score_skill_pool(
            &self.spec.preferred_skills,
            &profile_skills,
            pools.preferred_skills,
        );
        let skills = SkillsBreakdown {
            score: round2(required.score + preferred.score),
            max_score: pools.required_skills + pools.preferred_skills,
            required,
            preferred,
        };

        let experience = self.score_experience(profile);
        let education = self.score_education(profile);

        let total = skills.score + experience.score + education.score;
        let max_score = pools.max_score();
        let percentage = if max_score > 0.0 {
            round2(total / max_score * 100.0)
        } else {
            0.0
        };

        ScoreResult {
            total_score: round2(total),
            max_score,
            percentage,
            recommendation: recommendation(percentage).to_string(),
            breakdown: ScoreBreakdown {
                skills,
                experience,
                education,
            },
        }
    }

    fn score_experience(&self, profile: &ProfileRecord) -> ExperienceBreakdown {
        let min_years = self.spec.min_experience_years;

        let total_months: u32 = profile
            .experiences
            .iter()
            .map(|exp| duration_to_months(&exp.duration))
            .sum();
        let total_years = f64::from(total_months) / 12.0;

        let pool = self.spec.pools.experience;
        let meets = total_years >= min_years;
        let score = if meets {
            pool
        } else if min_years > 0.0 {
            total_years / min_years * pool
        } else {
            0.0
        };

        ExperienceBreakdown {
            score: round2(score),
            max_score: pool,
            total_years: round1(total_years),
            required_years: min_years,
            meets_requirement: meets,
        }
    }

    fn score_education(&self, profile: &ProfileRecord) -> EducationBreakdown {
        let pool = self.spec.pools.education;
        let required_levels = self.spec.education_level.clone();

        let profile_degrees: Vec<String> = profile
            .education
            .iter()
            .map(|edu| edu.degree.trim().to_lowercase())
            .filter(|d| !d.is_empty() && d != "n/a")
            .collect();

        // Absence of a requirement must never penalize.
        if required_levels.is_empty() {
            return EducationBreakdown {
                score: pool,
                max_score: pool,
                profile_degrees,
                required_levels,
                meets_requirement: true,
            };
        }

        let highest = profile_degrees
            .iter()
            .map(|d| degree_level(d))
            .max()
            .unwrap_or(0);
        let required = required_levels
            .iter()
            .map(|lvl| degree_level(&lvl.to_lowercase()))
            .max()
            .unwrap_or(0);

        let meets = highest >= required;
        let score = if meets {
            pool
        } else if highest > 0 && required > 0 {
            f64::from(highest) / f64::from(required) * pool
        } else {
            0.0
        };

        EducationBreakdown {
            score: round2(score),
            max_score: pool,
            profile_degrees,
            required_levels,
            meets_requirement: meets,
        }
    }
}

fn score_skill_pool(
    weights: &std::collections::BTreeMap<String, f64>,
    profile_skills: &[String],
    pool: f64,
) -> SkillPoolBreakdown {
    let total_weight: f64 = weights.values().sum();
    let mut score = 0.0;
    let mut matches = Vec::new();
    let mut missing = Vec::new();

    if total_weight > 0.0 {
        for (skill, weight) in weights {
            let target = skill.to_lowercase();
            match best_match(&target, profile_skills) {
                Some((ratio, matched_with)) if ratio >= SIMILARITY_THRESHOLD => {
                    // Proportional both to relative weight and to match
                    // confidence, so a skill never exceeds its fair
                    // share of the pool.
                    let points = weight / total_weight * pool * (ratio / 100.0);
                    score += points;
                    matches.push(SkillMatch {
                        skill: skill.clone(),
                        matched_with: matched_with.to_string(),
                        similarity: round2(ratio),
                        points: round2(points),
                    });
                }
                _ => missing.push(skill.clone()),
            }
        }
    }

    SkillPoolBreakdown {
        score: round2(score),
        max_score: pool,
        matches,
        missing,
    }
}

/// Parse a free-text duration into months, accepting `N yr`/`N yrs`
/// and `N mo`/`N mos` tokens independently.
pub fn duration_to_months(duration: &str) -> u32 {
    let years = YEARS_RE
        .captures(duration)
        .and_then(|c| c[1].parse::<u32>().ok())
        .unwrap_or(0);
    let months = MONTHS_RE
        .captures(duration)
        .and_then(|c| c[1].parse::<u32>().ok())
        .unwrap_or(0);
    years * 12 + months
}

/// Highest education level keyword found in a lowercased degree string.
fn degree_level(degree: &str) -> u32 {
    EDUCATION_LEVELS
        .iter()
        .filter(|(keyword, _)| degree.contains(keyword))
        .map(|(_, level)| *level)
        .max()
        .unwrap_or(0)
}

fn recommendation(percentage: f64) -> &'static str {
    if percentage >= 80.0 {
        "Highly Recommended - Strong match"
    } else if percentage >= 60.0 {
        "Recommended - Good match"
    } else if percentage >= 40.0 {
        "Consider - Moderate match"
    } else {
        "Not Recommended - Weak match"
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
