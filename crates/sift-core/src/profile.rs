use serde::{Deserialize, Serialize};

/// Structured result of extracting one profile page.
///
/// Every field is serde-defaulted so partially extracted profiles (a
/// section missing or empty on the source page) still deserialize.
/// Immutable once produced by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub profile_url: String,
    pub name: String,
    pub location: String,
    pub experiences: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
    pub projects: Vec<Project>,
    pub honors: Vec<Honor>,
    pub languages: Vec<Language>,
    pub licenses: Vec<License>,
    pub courses: Vec<Course>,
    pub volunteering: Vec<Volunteering>,
    pub test_scores: Vec<TestScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub title: String,
    pub company: String,
    /// Free-text duration, e.g. "2 yrs 3 mos" or "8 mos".
    pub duration: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub years: String,
}

/// A skill with the endorsement/context lines the extractor found under it.
///
/// The wire format also accepts a bare string for extractors that only
/// capture names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SkillRepr")]
pub struct Skill {
    pub name: String,
    pub details: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SkillRepr {
    Name(String),
    Full {
        #[serde(default)]
        name: String,
        #[serde(default)]
        details: Vec<String>,
    },
}

impl From<SkillRepr> for Skill {
    fn from(repr: SkillRepr) -> Self {
        match repr {
            SkillRepr::Name(name) => Skill {
                name,
                details: Vec::new(),
            },
            SkillRepr::Full { name, details } => Skill { name, details },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub title: String,
    pub duration: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Honor {
    pub title: String,
    pub issuer: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    pub name: String,
    pub proficiency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    pub name: String,
    pub issuer: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Course {
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volunteering {
    pub role: String,
    pub organization: String,
    pub duration: String,
    pub cause: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestScore {
    pub name: String,
    pub score: String,
    pub date: String,
    pub description: String,
}

impl ProfileRecord {
    /// Best available human-readable name.
    ///
    /// Extractors sometimes return an empty name or the literal "N/A";
    /// fall back to the `/in/<slug>` segment of the profile URL, then
    /// to "unknown".
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() && !name.eq_ignore_ascii_case("n/a") {
            return name.to_string();
        }
        if let Some(slug) = url_profile_slug(&self.profile_url) {
            return slug.replace('-', " ");
        }
        "unknown".to_string()
    }

    /// Filename-safe slug of [`display_name`](Self::display_name):
    /// lowercased, spaces and separators folded to underscores, anything
    /// that is not alphanumeric, `_`, or `-` removed.
    pub fn name_slug(&self) -> String {
        let slug: String = self
            .display_name()
            .to_lowercase()
            .replace([' ', '/', '\\'], "_")
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if slug.is_empty() {
            "unknown".to_string()
        } else {
            slug
        }
    }

    /// Skill names normalized for matching: lowercased, trimmed, with
    /// empty and "N/A" entries dropped.
    pub fn normalized_skills(&self) -> Vec<String> {
        self.skills
            .iter()
            .map(|s| s.name.trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != "n/a")
            .collect()
    }
}

/// Extract the `/in/<slug>` path segment from a profile URL, if present.
fn url_profile_slug(url: &str) -> Option<String> {
    let rest = url.split("/in/").nth(1)?;
    let slug = rest.split(['/', '?']).next()?.trim();
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_named(name: &str, url: &str) -> ProfileRecord {
        ProfileRecord {
            profile_url: url.to_string(),
            name: name.to_string(),
            ..ProfileRecord::default()
        }
    }

    #[test]
    fn test_display_name_prefers_extracted_name() {
        let p = profile_named("Jane Doe", "https://example.com/in/jane-doe/");
        assert_eq!(p.display_name(), "Jane Doe");
    }

    #[test]
    fn test_display_name_falls_back_to_url_slug() {
        let p = profile_named("N/A", "https://example.com/in/jane-doe?trk=x");
        assert_eq!(p.display_name(), "jane doe");

        let p = profile_named("  ", "https://example.com/in/jane-doe/details/");
        assert_eq!(p.display_name(), "jane doe");
    }

    #[test]
    fn test_display_name_unknown_without_slug() {
        let p = profile_named("", "https://example.com/pub/12345");
        assert_eq!(p.display_name(), "unknown");
    }

    #[test]
    fn test_name_slug_sanitizes() {
        let p = profile_named("Jane Doe / QA", "https://example.com/in/jane");
        assert_eq!(p.name_slug(), "jane_doe___qa");

        let p = profile_named("Ærø Ång", "https://example.com/in/x");
        assert_eq!(p.name_slug(), "ærø_ång");
    }

    #[test]
    fn test_normalized_skills_filters_placeholders() {
        let p = ProfileRecord {
            skills: vec![
                Skill {
                    name: "  Python ".into(),
                    details: vec![],
                },
                Skill {
                    name: "N/A".into(),
                    details: vec![],
                },
                Skill {
                    name: "".into(),
                    details: vec![],
                },
                Skill {
                    name: "SQL".into(),
                    details: vec!["3 endorsements".into()],
                },
            ],
            ..ProfileRecord::default()
        };
        assert_eq!(p.normalized_skills(), vec!["python", "sql"]);
    }

    #[test]
    fn test_skill_accepts_bare_string() {
        let p: ProfileRecord =
            serde_json::from_str(r#"{"skills": ["Python", {"name": "Go", "details": ["x"]}]}"#)
                .unwrap();
        assert_eq!(p.skills[0].name, "Python");
        assert!(p.skills[0].details.is_empty());
        assert_eq!(p.skills[1].name, "Go");
        assert_eq!(p.skills[1].details, vec!["x"]);
    }

    #[test]
    fn test_partial_profile_deserializes() {
        let p: ProfileRecord =
            serde_json::from_str(r#"{"profile_url": "https://example.com/in/a", "name": "A"}"#)
                .unwrap();
        assert!(p.experiences.is_empty());
        assert!(p.test_scores.is_empty());
    }
}
