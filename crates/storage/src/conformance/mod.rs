//! Conformance test suite for storage backends.
//!
//! A backend-agnostic suite that any implementation of both
//! [`RecordStorage`] and [`ChangeFeed`] can run to verify the contract the
//! view model relies on. The suite covers:
//!
//! - **CRUD**: create assigns identity, update patches in place, deletes
//! - **Scope**: listing is confined to one (owner, kind) pair, newest first
//! - **Feed**: events reach matching subscribers only, in emission order,
//!   and stop after unsubscribe; note feeds narrow to one customer
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty backend for each test:
//!
//! ```ignore
//! use bizflow_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryBackend::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod crud;
mod feed;
mod scope;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;

use bizflow_model::{
    ChangeEvent, CustomerInput, LeadInput, NewRecord, NoteInput, OwnerId, RecordId, TaskInput,
};

use crate::traits::Subscription;
use crate::{ChangeFeed, RecordStorage};

/// How long the suite waits for an expected change event.
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the suite waits before concluding no event is coming.
const QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "crud", "scope", "feed").
    pub category: String,
    /// Test name (e.g. "create_assigns_id_and_owner").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// backend instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(crud::run_crud_tests(&factory).await);
    results.extend(scope::run_scope_tests(&factory).await);
    results.extend(feed::run_feed_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: inputs with sensible defaults ───────────────────────────────────

fn owner(id: &str) -> OwnerId {
    OwnerId::from(id)
}

fn customer_input(name: &str, tags: &[&str]) -> NewRecord {
    NewRecord::Customer(CustomerInput {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    })
}

fn lead_input(name: &str, whole_dollars: i64) -> NewRecord {
    NewRecord::Lead(LeadInput {
        name: name.to_string(),
        amount: Decimal::new(whole_dollars, 0),
        stage: None,
    })
}

fn task_input(title: &str) -> NewRecord {
    NewRecord::Task(TaskInput {
        title: title.to_string(),
        project_id: None,
        stage: None,
    })
}

fn note_input(customer: &RecordId, content: &str) -> NewRecord {
    NewRecord::Note(NoteInput {
        customer_id: customer.clone(),
        content: content.to_string(),
    })
}

/// Wait for the next event on a subscription.
async fn next_event(sub: &mut Subscription) -> Result<ChangeEvent, String> {
    match tokio::time::timeout(EVENT_TIMEOUT, sub.events.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err("feed closed before an event arrived".to_string()),
        Err(_) => Err("timed out waiting for change event".to_string()),
    }
}

/// Ok if no event arrives within the quiet period.
async fn expect_silence(sub: &mut Subscription) -> Result<(), String> {
    match tokio::time::timeout(QUIET_PERIOD, sub.events.recv()).await {
        Ok(Some(event)) => Err(format!("unexpected {} event", event.label())),
        Ok(None) | Err(_) => Ok(()),
    }
}
