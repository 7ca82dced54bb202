use crate::error::Result;
use crate::log::{Fields, Level, Logger, TestStatus};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Message prefix of a result whose attempts ran out.
pub const EXHAUSTED_MESSAGE: &str = "max attempts exceeded";

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What one attempt of an action observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub pass: bool,
    pub message: String,
}

impl Outcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            pass: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            pass: false,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TestPoint / TestResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPoint {
    pub id: String,
    pub suite: String,
    pub max_attempts: u32,
}

impl TestPoint {
    pub fn new(id: impl Into<String>, suite: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            id: id.into(),
            suite: suite.into(),
            max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_point: String,
    pub suite: String,
    pub pass: bool,
    pub message: String,
    /// 1-indexed number of attempts used.
    pub attempts: u32,
    pub skipped: bool,
    #[serde(default)]
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs test points one attempt at a time, logging every transition.
pub struct Executor<'a> {
    logger: &'a Logger,
    backoff: Duration,
}

impl<'a> Executor<'a> {
    pub fn new(logger: &'a Logger, backoff: Duration) -> Self {
        Self { logger, backoff }
    }

    /// Run `action` until it passes or `point.max_attempts` is used up.
    ///
    /// An `Err` or a panic from the action counts as a failed attempt. The
    /// only error returned is a fatal log write.
    pub fn run<F, E>(&self, point: &TestPoint, mut action: F) -> Result<TestResult>
    where
        F: FnMut() -> std::result::Result<Outcome, E>,
        E: Display,
    {
        let max = point.max_attempts.max(1);
        let started = Instant::now();
        let mut last_message = String::new();

        for attempt in 1..=max {
            let (status, verb) = if attempt == 1 {
                (TestStatus::Start, "start")
            } else {
                (TestStatus::Retry, "retry")
            };
            self.log(
                point,
                Level::Info,
                status,
                attempt,
                max,
                format!("{verb} {} (attempt {attempt}/{max})", point.id),
            )?;

            let outcome = invoke(&mut action);

            if outcome.pass {
                self.log(
                    point,
                    Level::Success,
                    TestStatus::Pass,
                    attempt,
                    max,
                    outcome.message.clone(),
                )?;
                return Ok(TestResult {
                    test_point: point.id.clone(),
                    suite: point.suite.clone(),
                    pass: true,
                    message: outcome.message,
                    attempts: attempt,
                    skipped: false,
                    duration_ms: elapsed_ms(started),
                });
            }

            self.log(
                point,
                Level::Error,
                TestStatus::Fail,
                attempt,
                max,
                outcome.message.clone(),
            )?;
            last_message = outcome.message;

            if attempt < max && !self.backoff.is_zero() {
                std::thread::sleep(self.backoff);
            }
        }

        let message = if last_message.is_empty() {
            EXHAUSTED_MESSAGE.to_string()
        } else {
            format!("{EXHAUSTED_MESSAGE}: {last_message}")
        };
        self.log(
            point,
            Level::Error,
            TestStatus::Skip,
            max,
            max,
            message.clone(),
        )?;
        Ok(TestResult {
            test_point: point.id.clone(),
            suite: point.suite.clone(),
            pass: false,
            message,
            attempts: max,
            skipped: true,
            duration_ms: elapsed_ms(started),
        })
    }

    fn log(
        &self,
        point: &TestPoint,
        level: Level,
        status: TestStatus,
        attempt: u32,
        max: u32,
        message: String,
    ) -> Result<()> {
        let fields = Fields::suite(&point.suite)
            .test_point(&point.id)
            .status(status)
            .attempt(attempt, max);
        self.logger.emit(level, message, fields)
    }
}

fn invoke<F, E>(action: &mut F) -> Outcome
where
    F: FnMut() -> std::result::Result<Outcome, E>,
    E: Display,
{
    match panic::catch_unwind(AssertUnwindSafe(|| action())) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => Outcome::fail(e.to_string()),
        Err(payload) => {
            let text = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Outcome::fail(format!("action panicked: {text}"))
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TransportConfig, TransportMode};
    use crate::log::{read_relay, LogRecord};
    use std::convert::Infallible;
    use tempfile::TempDir;

    fn json_logger(dir: &TempDir) -> Logger {
        Logger::new(
            TransportConfig {
                mode: TransportMode::Json,
                write_attempts: 1,
                write_backoff_ms: 0,
                ..TransportConfig::default()
            },
            dir.path().join("run.log"),
            dir.path().join("relay.jsonl"),
        )
    }

    fn statuses(records: &[LogRecord]) -> Vec<TestStatus> {
        records
            .iter()
            .filter_map(|r| r.fields.test_status)
            .collect()
    }

    #[test]
    fn always_failing_action_is_skipped_after_three_attempts() {
        let dir = TempDir::new().unwrap();
        let logger = json_logger(&dir);
        let exec = Executor::new(&logger, Duration::ZERO);
        let point = TestPoint::new("API-USER-001-list", "users", 3);

        let result = exec
            .run(&point, || Ok::<_, Infallible>(Outcome::fail("status 500")))
            .unwrap();

        assert!(!result.pass);
        assert!(result.skipped);
        assert_eq!(result.attempts, 3);
        assert!(result.message.starts_with(EXHAUSTED_MESSAGE));

        let records = read_relay(logger.relay_path()).unwrap();
        use TestStatus::*;
        assert_eq!(
            statuses(&records),
            vec![Start, Fail, Retry, Fail, Retry, Fail, Skip]
        );
        let fail_attempts: Vec<_> = records
            .iter()
            .filter(|r| r.fields.test_status == Some(Fail))
            .map(|r| r.fields.attempt.unwrap())
            .collect();
        assert_eq!(fail_attempts, vec![1, 2, 3]);
        assert!(records
            .iter()
            .all(|r| r.fields.test_point.as_deref() == Some("API-USER-001-list")));
    }

    #[test]
    fn fails_twice_then_passes() {
        let dir = TempDir::new().unwrap();
        let logger = json_logger(&dir);
        let exec = Executor::new(&logger, Duration::ZERO);
        let point = TestPoint::new("API-AUTH-002-login-valid", "auth", 5);

        let mut calls = 0;
        let result = exec
            .run(&point, || {
                calls += 1;
                Ok::<_, Infallible>(if calls < 3 {
                    Outcome::fail("connection refused")
                } else {
                    Outcome::pass("200 code=0")
                })
            })
            .unwrap();

        assert!(result.pass);
        assert!(!result.skipped);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.message, "200 code=0");
        assert_eq!(calls, 3);

        let records = read_relay(logger.relay_path()).unwrap();
        use TestStatus::*;
        assert_eq!(
            statuses(&records),
            vec![Start, Fail, Retry, Fail, Retry, Pass]
        );
        assert_eq!(records.last().unwrap().level, Level::Success);
    }

    #[test]
    fn event_counts_are_bounded_by_max_attempts() {
        for n in 1..=4u32 {
            for pass_on in 1..=n + 1 {
                let dir = TempDir::new().unwrap();
                let logger = json_logger(&dir);
                let exec = Executor::new(&logger, Duration::ZERO);
                let point = TestPoint::new("TP", "s", n);
                let mut calls = 0;
                exec.run(&point, || {
                    calls += 1;
                    Ok::<_, Infallible>(if calls >= pass_on {
                        Outcome::pass("ok")
                    } else {
                        Outcome::fail("no")
                    })
                })
                .unwrap();

                let s = statuses(&read_relay(logger.relay_path()).unwrap());
                let count = |st: TestStatus| s.iter().filter(|x| **x == st).count();
                assert_eq!(count(TestStatus::Start), 1);
                assert!(count(TestStatus::Retry) <= (n - 1) as usize);
                assert_eq!(count(TestStatus::Pass) + count(TestStatus::Skip), 1);
                assert!(count(TestStatus::Fail) <= n as usize);
            }
        }
    }

    #[test]
    fn action_error_becomes_failed_attempt() {
        let dir = TempDir::new().unwrap();
        let logger = json_logger(&dir);
        let exec = Executor::new(&logger, Duration::ZERO);
        let point = TestPoint::new("TP-ERR", "s", 1);
        let result = exec
            .run(&point, || Err::<Outcome, _>("socket closed"))
            .unwrap();
        assert!(result.skipped);
        assert_eq!(result.message, "max attempts exceeded: socket closed");
    }

    #[test]
    fn action_panic_becomes_failed_attempt() {
        let dir = TempDir::new().unwrap();
        let logger = json_logger(&dir);
        let exec = Executor::new(&logger, Duration::ZERO);
        let point = TestPoint::new("TP-PANIC", "s", 2);
        let mut calls = 0;
        let result = exec
            .run(&point, || -> std::result::Result<Outcome, Infallible> {
                calls += 1;
                if calls == 1 {
                    panic!("boom");
                }
                Ok(Outcome::pass("recovered"))
            })
            .unwrap();
        assert!(result.pass);
        assert_eq!(result.attempts, 2);
        let records = read_relay(logger.relay_path()).unwrap();
        assert!(records
            .iter()
            .any(|r| r.message == "action panicked: boom"));
    }

    #[test]
    fn zero_max_attempts_still_runs_once() {
        let dir = TempDir::new().unwrap();
        let logger = json_logger(&dir);
        let exec = Executor::new(&logger, Duration::ZERO);
        let point = TestPoint::new("TP-ZERO", "s", 0);
        let result = exec
            .run(&point, || Ok::<_, Infallible>(Outcome::pass("ok")))
            .unwrap();
        assert!(result.pass);
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn backoff_is_applied_between_attempts_only() {
        let dir = TempDir::new().unwrap();
        let logger = json_logger(&dir);
        let exec = Executor::new(&logger, Duration::from_millis(40));
        let point = TestPoint::new("TP-SLOW", "s", 3);
        let start = Instant::now();
        exec.run(&point, || Ok::<_, Infallible>(Outcome::fail("no")))
            .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
    }

    #[test]
    fn logger_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let relay = dir.path().join("relay.jsonl");
        std::fs::create_dir_all(&relay).unwrap();
        let logger = Logger::new(
            TransportConfig {
                mode: TransportMode::Json,
                write_attempts: 1,
                write_backoff_ms: 0,
                ..TransportConfig::default()
            },
            dir.path().join("run.log"),
            relay,
        );
        let exec = Executor::new(&logger, Duration::ZERO);
        let point = TestPoint::new("TP", "s", 1);
        assert!(exec
            .run(&point, || Ok::<_, Infallible>(Outcome::pass("ok")))
            .is_err());
    }
}
