use crate::actions::ActionSpec;
use crate::config::{ConfigWarning, WarnLevel};
use crate::error::{AcceptanceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Plan document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPointSpec {
    pub id: String,
    /// Overrides `executor.max_attempts` for this test point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Acceptance/API ids proven by this test point.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<String>,
    pub action: ActionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub test_points: Vec<TestPointSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteSpec {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

impl SuiteSpec {
    pub fn test_points(&self) -> impl Iterator<Item = &TestPointSpec> {
        self.groups.iter().flat_map(|g| g.test_points.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Documents {
    /// Requirements document listing acceptance items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<PathBuf>,
    /// API list document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_list: Option<PathBuf>,
}

impl Documents {
    pub fn is_empty(&self) -> bool {
        self.requirements.is_none() && self.api_list.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Documents::is_empty")]
    pub documents: Documents,
    #[serde(default)]
    pub suites: Vec<SuiteSpec>,
    /// Coverage id → test point ids that prove it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub coverage: BTreeMap<String, Vec<String>>,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl TestPlan {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AcceptanceError::PlanNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let plan: TestPlan = serde_yaml::from_str(&data)?;
        Ok(plan)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteSpec> {
        self.suites.iter().find(|s| s.name == name)
    }

    pub fn test_point_ids(&self) -> BTreeSet<&str> {
        self.suites
            .iter()
            .flat_map(SuiteSpec::test_points)
            .map(|tp| tp.id.as_str())
            .collect()
    }

    /// The static mapping table: coverage id → test point ids, merging the
    /// plan-level `coverage` table with every test point's `covers` list.
    pub fn coverage_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (id, tps) in &self.coverage {
            map.entry(id.clone())
                .or_default()
                .extend(tps.iter().cloned());
        }
        for tp in self.suites.iter().flat_map(SuiteSpec::test_points) {
            for id in &tp.covers {
                map.entry(id.clone()).or_default().insert(tp.id.clone());
            }
        }
        map
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if self.suites.is_empty() {
            error("plan defines no suites".to_string());
        }

        let mut seen_suites = HashSet::new();
        let mut suite_slugs: HashMap<String, &str> = HashMap::new();
        let mut seen_ids = HashSet::new();
        for suite in &self.suites {
            if suite.name.trim().is_empty() {
                error("suite with an empty name".to_string());
            }
            if !seen_suites.insert(suite.name.as_str()) {
                error(format!("duplicate suite '{}'", suite.name));
            } else {
                // Suite summaries are keyed by slug; two names sharing one would overwrite.
                let slug = crate::paths::file_slug(&suite.name);
                if let Some(other) = suite_slugs.get(slug.as_str()).copied() {
                    error(format!(
                        "suites '{other}' and '{}' both write reports/suites/{slug}.json",
                        suite.name
                    ));
                } else {
                    suite_slugs.insert(slug, suite.name.as_str());
                }
            }
            if suite.groups.is_empty() {
                error(format!("suite '{}' has no groups", suite.name));
            }
            for group in &suite.groups {
                if group.test_points.is_empty() {
                    error(format!(
                        "group '{}' in suite '{}' has no test points",
                        group.name, suite.name
                    ));
                }
                for tp in &group.test_points {
                    if tp.id.trim().is_empty() {
                        error(format!("test point with an empty id in group '{}'", group.name));
                    } else if !seen_ids.insert(tp.id.as_str()) {
                        error(format!("duplicate test point id '{}'", tp.id));
                    }
                }
            }
        }

        for (cov_id, tps) in &self.coverage {
            for tp in tps {
                if !seen_ids.contains(tp.as_str()) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("coverage '{cov_id}' maps to unknown test point '{tp}'"),
                    });
                }
            }
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Starter plan
// ---------------------------------------------------------------------------

/// Plan written by `acceptance init`: a health check plus a login flow
/// against the conventional generated backend.
pub const STARTER_PLAN: &str = r#"base_url: http://localhost:8080
documents:
  requirements: docs/requirements.md
  api_list: docs/api-list.md
suites:
  - name: smoke
    groups:
      - name: health
        test_points:
          - id: SMOKE-001-health
            max_attempts: 5
            action:
              type: http
              method: GET
              path: /health
  - name: auth
    groups:
      - name: login
        test_points:
          - id: API-AUTH-002-login-valid
            covers: [AC-001-01]
            action:
              type: http
              method: POST
              path: /api/auth/login
              body:
                username: admin
                password: admin123
              expect_status: 200
              expect_code: 0
              save:
                token: /data/token
          - id: API-AUTH-002-login-invalid
            covers: [AC-001-02]
            max_attempts: 1
            action:
              type: http
              method: POST
              path: /api/auth/login
              body:
                username: admin
                password: wrong
              expect_code: 401
coverage: {}
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn starter_plan_parses_and_validates() {
        let plan: TestPlan = serde_yaml::from_str(STARTER_PLAN).unwrap();
        assert_eq!(plan.suites.len(), 2);
        assert_eq!(plan.suite("auth").unwrap().test_points().count(), 2);
        assert!(plan.validate().is_empty(), "{:?}", plan.validate());
    }

    #[test]
    fn coverage_map_merges_table_and_inline_covers() {
        let yaml = r#"
suites:
  - name: users
    groups:
      - name: crud
        test_points:
          - id: API-USER-001-create
            covers: [AC-002-01]
            action: { type: http, method: POST, path: /api/users }
          - id: API-USER-002-list
            action: { type: http, path: /api/users }
coverage:
  AC-002-01: [API-USER-002-list]
  AC-002-02: [API-USER-002-list]
"#;
        let plan: TestPlan = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plan.base_url, "http://localhost:8080");
        let map = plan.coverage_map();
        assert_eq!(map.len(), 2);
        let ac1: Vec<_> = map["AC-002-01"].iter().map(String::as_str).collect();
        assert_eq!(ac1, vec!["API-USER-001-create", "API-USER-002-list"]);
    }

    #[test]
    fn validate_flags_duplicates_and_empty_groups() {
        let yaml = r#"
suites:
  - name: s
    groups:
      - name: g1
        test_points:
          - id: TP-1
            action: { type: file_exists, path: a }
          - id: TP-1
            action: { type: file_exists, path: b }
      - name: g2
coverage:
  AC-1: [TP-404]
"#;
        let plan: TestPlan = serde_yaml::from_str(yaml).unwrap();
        let warnings = plan.validate();
        let errors: Vec<_> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message.as_str())
            .collect();
        assert!(errors.contains(&"duplicate test point id 'TP-1'"));
        assert!(errors.contains(&"group 'g2' in suite 's' has no test points"));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("TP-404")));
        assert!(plan.has_errors());
    }

    #[test]
    fn validate_rejects_suite_names_with_the_same_report_file() {
        let yaml = r#"
suites:
  - name: user crud
    groups:
      - name: g
        test_points:
          - id: TP-1
            action: { type: file_exists, path: a }
  - name: User-CRUD
    groups:
      - name: g
        test_points:
          - id: TP-2
            action: { type: file_exists, path: b }
  - name: users
    groups:
      - name: g
        test_points:
          - id: TP-3
            action: { type: file_exists, path: c }
"#;
        let plan: TestPlan = serde_yaml::from_str(yaml).unwrap();
        let errors: Vec<_> = plan
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        assert_eq!(
            errors,
            vec!["suites 'user crud' and 'User-CRUD' both write reports/suites/user-crud.json"]
        );
        assert!(plan.has_errors());
    }

    #[test]
    fn load_missing_plan() {
        let dir = TempDir::new().unwrap();
        let err = TestPlan::load(&dir.path().join("plan.yaml")).unwrap_err();
        assert!(matches!(err, AcceptanceError::PlanNotFound(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".acceptance/plan.yaml");
        let plan: TestPlan = serde_yaml::from_str(STARTER_PLAN).unwrap();
        plan.save(&path).unwrap();
        assert_eq!(TestPlan::load(&path).unwrap(), plan);
    }
}
