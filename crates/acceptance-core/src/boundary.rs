use crate::error::{AcceptanceError, Result};
use crate::log::{Fields, Level, Logger, TestStatus};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scope / Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    Suite,
    Group,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Suite => "SUITE",
            Scope::Group => "GROUP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Start,
    End,
}

impl Direction {
    fn status(self) -> TestStatus {
        match self {
            Direction::Start => TestStatus::Start,
            Direction::End => TestStatus::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryMarker {
    pub suite: String,
    pub scope: Scope,
    pub name: String,
    pub direction: Direction,
}

impl BoundaryMarker {
    pub fn id(&self) -> String {
        boundary_id(self.scope, &self.name)
    }
}

/// Pseudo test-point id for a boundary: `SUITE-USER-CRUD` for suite
/// "user crud". Non-alphanumeric runs collapse to one `-`.
pub fn boundary_id(scope: Scope, name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !normalized.is_empty() {
                normalized.push('-');
            }
            pending_sep = false;
            normalized.extend(c.to_uppercase());
        } else {
            pending_sep = true;
        }
    }
    if normalized.is_empty() {
        normalized.push_str("UNNAMED");
    }
    format!("{}-{normalized}", scope.as_str())
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

/// Emits SUITE/GROUP markers and enforces that they pair and nest.
pub struct Boundaries<'a> {
    logger: &'a Logger,
    open: Vec<(Scope, String)>,
    emitted: Vec<BoundaryMarker>,
}

impl<'a> Boundaries<'a> {
    pub fn new(logger: &'a Logger) -> Self {
        Self {
            logger,
            open: Vec::new(),
            emitted: Vec::new(),
        }
    }

    pub fn open(&mut self, suite: &str, scope: Scope, name: &str) -> Result<()> {
        match (scope, self.open.last()) {
            (Scope::Suite, None) => {}
            (Scope::Suite, Some((_, outer))) => {
                return Err(AcceptanceError::Boundary(format!(
                    "suite '{name}' opened while '{outer}' is still open"
                )));
            }
            (Scope::Group, Some((Scope::Suite, open_suite))) if open_suite == suite => {}
            (Scope::Group, Some((Scope::Group, outer))) => {
                return Err(AcceptanceError::Boundary(format!(
                    "group '{name}' opened inside group '{outer}'"
                )));
            }
            (Scope::Group, _) => {
                return Err(AcceptanceError::Boundary(format!(
                    "group '{name}' opened outside suite '{suite}'"
                )));
            }
        }
        self.emit(suite, scope, name, Direction::Start)?;
        self.open.push((scope, name.to_string()));
        Ok(())
    }

    pub fn close(&mut self, suite: &str, scope: Scope, name: &str) -> Result<()> {
        match self.open.last() {
            Some((s, n)) if *s == scope && n == name => {}
            Some((s, n)) => {
                return Err(AcceptanceError::Boundary(format!(
                    "cannot close {} '{name}' while {} '{n}' is innermost",
                    scope.as_str(),
                    s.as_str()
                )));
            }
            None => {
                return Err(AcceptanceError::Boundary(format!(
                    "{} '{name}' closed without being opened",
                    scope.as_str()
                )));
            }
        }
        self.emit(suite, scope, name, Direction::End)?;
        self.open.pop();
        Ok(())
    }

    /// Error if any scope is still open.
    pub fn finish(&self) -> Result<()> {
        if self.open.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = self
            .open
            .iter()
            .map(|(s, n)| format!("{} '{n}'", s.as_str()))
            .collect();
        Err(AcceptanceError::Boundary(format!(
            "unclosed: {}",
            names.join(", ")
        )))
    }

    /// Markers emitted so far, in emission order.
    pub fn markers(&self) -> &[BoundaryMarker] {
        &self.emitted
    }

    fn emit(&mut self, suite: &str, scope: Scope, name: &str, direction: Direction) -> Result<()> {
        let marker = BoundaryMarker {
            suite: suite.to_string(),
            scope,
            name: name.to_string(),
            direction,
        };
        let verb = match direction {
            Direction::Start => "begin",
            Direction::End => "end",
        };
        let fields = Fields::suite(suite)
            .test_point(marker.id())
            .status(direction.status());
        self.logger.emit(
            Level::Info,
            format!("{verb} {} {name}", scope.as_str().to_lowercase()),
            fields,
        )?;
        self.emitted.push(marker);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
