//! Requirement and API coverage.
//!
//! Ids come from two documents: acceptance items from the requirements
//! document and API ids from the API list. Each id is linked to the test
//! points that prove it through the plan's static mapping table, and is
//! considered passed only when every linked test point ran and passed.

use crate::executor::TestResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageKind {
    Acceptance,
    Api,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub id: String,
    pub kind: CoverageKind,
    pub included: bool,
    pub passed: bool,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub acceptance: Vec<CoverageEntry>,
    pub api: Vec<CoverageEntry>,
    pub all_items_included: bool,
    pub all_items_passed: bool,
    /// Mapped ids that appear in neither document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_ids: Vec<String>,
}

impl CoverageReport {
    pub fn entries(&self) -> impl Iterator<Item = &CoverageEntry> {
        self.acceptance.iter().chain(self.api.iter())
    }

    pub fn gate_passed(&self) -> bool {
        self.all_items_included && self.all_items_passed
    }
}

/// Every distinct match of `pattern` in `text`, sorted.
pub fn extract_ids(text: &str, pattern: &Regex) -> BTreeSet<String> {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Build coverage entries for the given ids.
///
/// `mapping` is the static coverage id → test point ids table. With
/// `link_api_prefix`, a test point id equal to an API id or starting with
/// `<api id>-` is linked to it as well.
pub fn aggregate(
    acceptance_ids: &BTreeSet<String>,
    api_ids: &BTreeSet<String>,
    mapping: &BTreeMap<String, BTreeSet<String>>,
    results: &[TestResult],
    link_api_prefix: bool,
) -> CoverageReport {
    let by_id: HashMap<&str, &TestResult> = results
        .iter()
        .map(|r| (r.test_point.as_str(), r))
        .collect();

    let acceptance: Vec<CoverageEntry> = acceptance_ids
        .iter()
        .map(|id| {
            let linked = linked_points(id, mapping, results, false);
            entry(id, CoverageKind::Acceptance, linked, &by_id)
        })
        .collect();

    let api: Vec<CoverageEntry> = api_ids
        .iter()
        .map(|id| {
            let linked = linked_points(id, mapping, results, link_api_prefix);
            entry(id, CoverageKind::Api, linked, &by_id)
        })
        .collect();

    let unknown_ids = mapping
        .keys()
        .filter(|k| !acceptance_ids.contains(*k) && !api_ids.contains(*k))
        .cloned()
        .collect();

    let all_items_included = acceptance.iter().chain(&api).all(|e| e.included);
    let all_items_passed = acceptance.iter().chain(&api).all(|e| e.passed);

    CoverageReport {
        acceptance,
        api,
        all_items_included,
        all_items_passed,
        unknown_ids,
    }
}

fn linked_points(
    id: &str,
    mapping: &BTreeMap<String, BTreeSet<String>>,
    results: &[TestResult],
    by_prefix: bool,
) -> BTreeSet<String> {
    let mut linked = mapping.get(id).cloned().unwrap_or_default();
    if by_prefix {
        let prefix = format!("{id}-");
        linked.extend(
            results
                .iter()
                .filter(|r| r.test_point == id || r.test_point.starts_with(&prefix))
                .map(|r| r.test_point.clone()),
        );
    }
    linked
}

fn entry(
    id: &str,
    kind: CoverageKind,
    linked: BTreeSet<String>,
    by_id: &HashMap<&str, &TestResult>,
) -> CoverageEntry {
    if linked.is_empty() {
        return CoverageEntry {
            id: id.to_string(),
            kind,
            included: false,
            passed: false,
            evidence: "no test point assigned".to_string(),
            test_points: Vec::new(),
        };
    }

    let mut passed = true;
    let mut evidence = Vec::with_capacity(linked.len());
    for tp in &linked {
        match by_id.get(tp.as_str()) {
            Some(r) if r.pass => evidence.push(format!("{tp}: PASS ({})", r.message)),
            Some(r) => {
                passed = false;
                evidence.push(format!("{tp}: FAIL ({})", r.message));
            }
            None => {
                passed = false;
                evidence.push(format!("{tp}: NOT RUN"));
            }
        }
    }

    CoverageEntry {
        id: id.to_string(),
        kind,
        included: true,
        passed,
        evidence: evidence.join("; "),
        test_points: linked.into_iter().collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
