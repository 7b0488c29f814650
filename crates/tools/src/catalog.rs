//! In-memory policy and garage catalog.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SAMPLE_CATALOG: &str = include_str!("../data/sample_catalog.json");

/// Minimum similarity for a fuzzy policyholder-name match.
pub const NAME_MATCH_THRESHOLD: f64 = 0.70;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRule {
    pub section: String,
    #[serde(default)]
    pub assistance: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub policy_number: String,
    pub policyholder_name: String,
    pub policy_type: String,
    #[serde(default)]
    pub coverage_rules: Vec<CoverageRule>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Garage {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Garage {
    fn serves(&self, city: &str) -> bool {
        let needle = city.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.city
            .as_deref()
            .is_some_and(|c| c.to_lowercase() == needle)
            || self.location.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub garages: Vec<Garage>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse catalog at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl Catalog {
    /// The embedded sample catalog.
    pub fn sample() -> Self {
        // Embedded at compile time and covered by tests.
        serde_json::from_str(SAMPLE_CATALOG).unwrap_or_default()
    }

    /// Load from `path`, or fall back to the embedded sample.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let Some(path) = path else {
            return Ok(Self::sample());
        };

        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let catalog: Self = serde_json::from_str(&content).map_err(|e| CatalogError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            path = %path.display(),
            policies = catalog.policies.len(),
            garages = catalog.garages.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    /// Find the policy for a policyholder name.
    ///
    /// Case-insensitive substring match in either direction first, then the
    /// best fuzzy match at or above [`NAME_MATCH_THRESHOLD`].
    pub fn find_policy(&self, name: &str) -> Option<&Policy> {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        let substring = self.policies.iter().find(|p| {
            let holder = p.policyholder_name.to_lowercase();
            !holder.is_empty() && (holder.contains(&query) || query.contains(&holder))
        });
        if substring.is_some() {
            return substring;
        }

        self.policies
            .iter()
            .map(|p| (p, similarity(&query, &p.policyholder_name.to_lowercase())))
            .filter(|(_, score)| *score >= NAME_MATCH_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
    }

    /// Garages serving a city. Empty when none match.
    pub fn garages_in(&self, city: &str) -> Vec<&Garage> {
        self.garages.iter().filter(|g| g.serves(city)).collect()
    }
}

/// Indel similarity: `2 * LCS / (len_a + len_b)`, in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (2 * prev[b.len()]) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sample_catalog_parses() {
        let catalog = Catalog::sample();
        assert_eq!(catalog.policies.len(), 3);
        assert_eq!(catalog.garages.len(), 5);
    }

    #[test]
    fn exact_and_substring_matches() {
        let catalog = Catalog::sample();
        assert_eq!(catalog.find_policy("jane doe").unwrap().policy_number, "RA-100234");
        assert_eq!(
            catalog.find_policy("Mr. Carlos Mendez").unwrap().policy_number,
            "RA-100871"
        );
    }

    #[test]
    fn fuzzy_match_tolerates_typos() {
        let catalog = Catalog::sample();
        assert_eq!(catalog.find_policy("Priya Sharmah").unwrap().policy_number, "RA-101455");
        assert_eq!(catalog.find_policy("Jane Dough").unwrap().policy_number, "RA-100234");
    }

    #[test]
    fn unknown_name_has_no_policy() {
        let catalog = Catalog::sample();
        assert!(catalog.find_policy("Zebulon Quartermaine").is_none());
        assert!(catalog.find_policy("   ").is_none());
    }

    #[test]
    fn similarity_bounds() {
        assert!((similarity("abc", "abc") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("abc", "xyz").abs() < f64::EPSILON);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn garages_match_city_case_insensitively() {
        let catalog = Catalog::sample();
        assert_eq!(catalog.garages_in("san francisco").len(), 2);
        assert_eq!(catalog.garages_in("SAN JOSE").len(), 1);
        assert!(catalog.garages_in("Reykjavik").is_empty());
        assert!(catalog.garages_in("").is_empty());
    }

    #[test]
    fn load_from_file_overrides_sample() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"policies": [], "garages": [{{"name": "Solo Garage", "location": "1 Main St, Fresno"}}]}}"#
        )
        .unwrap();
        let catalog = Catalog::load(Some(file.path())).unwrap();
        assert!(catalog.policies.is_empty());
        assert_eq!(catalog.garages_in("fresno")[0].name, "Solo Garage");
    }

    #[test]
    fn load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Catalog::load(Some(file.path())),
            Err(CatalogError::Parse { .. })
        ));
    }
}
