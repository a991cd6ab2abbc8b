//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first admission check after cool_down has elapsed
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - Per-group circuit breaker (not global); groups share no lock
//! - Open → Half-Open is evaluated lazily, there is no background timer
//! - Single probe in Half-Open (prevents hammering recovering upstream)
//! - A probe that ends without a verdict gives its slot back on drop

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::schema::BreakerConfig;
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerRecord {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    /// Bumped every time a probe is handed out.
    probe_epoch: u64,
}

/// Source of an outcome report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reporter {
    /// Bare `record_*` call, paired by the caller with its own `admit`.
    Direct,
    /// Report through a permit; `Some` carries the probe epoch it was issued.
    Permit(Option<u64>),
}

impl Reporter {
    /// Only the holder of the current probe may decide a Half-Open breaker.
    fn holds_probe(self, record: &BreakerRecord) -> bool {
        match self {
            Self::Direct => true,
            Self::Permit(Some(epoch)) => record.probe_in_flight && record.probe_epoch == epoch,
            Self::Permit(None) => false,
        }
    }
}

/// Kind of admission granted by [`CircuitBreaker::try_admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe(u64),
}

/// State machine guarding one operation group.
#[derive(Debug)]
pub struct CircuitBreaker {
    group: String,
    failure_threshold: u32,
    cool_down: Duration,
    record: Mutex<BreakerRecord>,
}

impl CircuitBreaker {
    pub fn new(group: impl Into<String>, failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            group: group.into(),
            failure_threshold: failure_threshold.max(1),
            cool_down,
            record: Mutex::new(BreakerRecord {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
                probe_epoch: 0,
            }),
        }
    }

    pub fn from_config(group: impl Into<String>, config: &BreakerConfig) -> Self {
        Self::new(
            group,
            config.failure_threshold,
            Duration::from_millis(config.cool_down_ms),
        )
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn cool_down(&self) -> Duration {
        self.cool_down
    }

    /// Last stored state. An Open breaker whose cool-down has elapsed still
    /// reports Open until the next admission check.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Gate check. May turn this caller into the Half-Open probe.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&self, now: Instant) -> bool {
        self.try_admit(now).is_some()
    }

    /// Admission wrapped in a permit that releases an unresolved probe
    /// slot when dropped.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(self: &Arc<Self>, now: Instant) -> Option<BreakerPermit> {
        self.try_admit(now).map(|admission| BreakerPermit {
            breaker: Arc::clone(self),
            probe_epoch: match admission {
                Admission::Normal => None,
                Admission::Probe(epoch) => Some(epoch),
            },
        })
    }

    fn try_admit(&self, now: Instant) -> Option<Admission> {
        let mut record = self.lock();
        let state = record.state;
        match state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let elapsed = record
                    .opened_at
                    .map_or(self.cool_down, |opened| now.saturating_duration_since(opened));
                if elapsed < self.cool_down {
                    return None;
                }
                record.state = CircuitState::HalfOpen;
                let epoch = Self::hand_out_probe(&mut record);
                drop(record);
                self.on_transition(CircuitState::Open, CircuitState::HalfOpen);
                Some(Admission::Probe(epoch))
            }
            CircuitState::HalfOpen if record.probe_in_flight => None,
            CircuitState::HalfOpen => Some(Admission::Probe(Self::hand_out_probe(&mut record))),
        }
    }

    fn hand_out_probe(record: &mut BreakerRecord) -> u64 {
        record.probe_epoch += 1;
        record.probe_in_flight = true;
        record.probe_epoch
    }

    /// Report a successful upstream call. The caller is taken to be the one
    /// that was just admitted, so a Half-Open breaker closes.
    pub fn record_success(&self) {
        self.resolve_success(Reporter::Direct)
    }

    /// Report a failed upstream call.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) {
        self.resolve_failure(Reporter::Direct, now)
    }

    fn resolve_success(&self, reporter: Reporter) {
        let mut record = self.lock();
        let state = record.state;
        match state {
            CircuitState::Closed => record.consecutive_failures = 0,
            CircuitState::HalfOpen if reporter.holds_probe(&record) => {
                record.state = CircuitState::Closed;
                record.consecutive_failures = 0;
                record.opened_at = None;
                record.probe_in_flight = false;
                drop(record);
                self.on_transition(CircuitState::HalfOpen, CircuitState::Closed);
            }
            CircuitState::HalfOpen => {
                drop(record);
                tracing::debug!(group = %self.group, "Ignoring success from a call that is not the probe");
            }
            // Late completion of a call admitted before the circuit opened.
            CircuitState::Open => {}
        }
    }

    fn resolve_failure(&self, reporter: Reporter, now: Instant) {
        let mut record = self.lock();
        let state = record.state;
        match state {
            CircuitState::Closed => {
                record.consecutive_failures = record.consecutive_failures.saturating_add(1);
                if record.consecutive_failures >= self.failure_threshold {
                    record.state = CircuitState::Open;
                    record.opened_at = Some(now);
                    let failures = record.consecutive_failures;
                    drop(record);
                    tracing::warn!(
                        group = %self.group,
                        failures,
                        threshold = self.failure_threshold,
                        "Failure threshold reached"
                    );
                    self.on_transition(CircuitState::Closed, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if reporter.holds_probe(&record) => {
                record.consecutive_failures = record.consecutive_failures.saturating_add(1);
                record.state = CircuitState::Open;
                record.opened_at = Some(now);
                record.probe_in_flight = false;
                drop(record);
                self.on_transition(CircuitState::HalfOpen, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                drop(record);
                tracing::debug!(group = %self.group, "Ignoring failure from a call that is not the probe");
            }
            CircuitState::Open => {}
        }
    }

    /// Whether a call holding `reporter` may send another attempt.
    fn may_continue(&self, reporter: Reporter) -> bool {
        let record = self.lock();
        match record.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => reporter.holds_probe(&record),
            CircuitState::Open => false,
        }
    }

    fn release_probe(&self, epoch: u64) {
        let mut record = self.lock();
        if record.state == CircuitState::HalfOpen
            && record.probe_in_flight
            && record.probe_epoch == epoch
        {
            record.probe_in_flight = false;
            drop(record);
            tracing::debug!(group = %self.group, "Probe finished without a verdict, slot released");
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> BreakerSnapshot {
        let record = self.lock();
        let retry_in_ms = match (record.state, record.opened_at) {
            (CircuitState::Open, Some(opened)) => Some(
                self.cool_down
                    .saturating_sub(now.saturating_duration_since(opened))
                    .as_millis() as u64,
            ),
            _ => None,
        };
        BreakerSnapshot {
            group: self.group.clone(),
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            failure_threshold: self.failure_threshold,
            cool_down_ms: self.cool_down.as_millis() as u64,
            retry_in_ms,
        }
    }

    fn on_transition(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => {
                tracing::warn!(group = %self.group, %from, %to, cool_down = ?self.cool_down, "Circuit opened")
            }
            _ => tracing::info!(group = %self.group, %from, %to, "Circuit state changed"),
        }
        metrics::record_breaker_transition(&self.group, to.as_str(), to.gauge_value());
    }

    fn lock(&self) -> MutexGuard<'_, BreakerRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of admission held for the lifetime of one invocation.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    probe_epoch: Option<u64>,
}

impl BreakerPermit {
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn is_probe(&self) -> bool {
        self.probe_epoch.is_some()
    }

    /// Report a successful attempt. While Half-Open only the current probe
    /// closes the circuit; outcomes of other calls are ignored.
    pub fn record_success(&self) {
        self.breaker.resolve_success(self.reporter())
    }

    /// Report a failed attempt. While Half-Open only the current probe
    /// reopens the circuit.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) {
        self.breaker.resolve_failure(self.reporter(), now)
    }

    /// Whether this invocation may send another attempt: always while
    /// Closed, never while Open, and only for the current probe while
    /// Half-Open.
    pub fn may_continue(&self) -> bool {
        self.breaker.may_continue(self.reporter())
    }

    fn reporter(&self) -> Reporter {
        Reporter::Permit(self.probe_epoch)
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if let Some(epoch) = self.probe_epoch {
            self.breaker.release_probe(epoch);
        }
    }
}

/// Point-in-time view of a breaker, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub group: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub cool_down_ms: u64,
    /// Remaining cool-down while Open.
    pub retry_in_ms: Option<u64>,
}

/// Breakers keyed by operation group, plus the operation → group wiring.
///
/// Built once at startup and immutable afterwards; each breaker carries its
/// own lock.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    groups: BTreeMap<String, Arc<CircuitBreaker>>,
    operations: HashMap<&'static str, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `operation` behind the breaker of `group`, creating it on first use.
    pub fn guard(&mut self, operation: &'static str, group: &str, config: &BreakerConfig) {
        let breaker = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::from_config(group, config)))
            .clone();
        self.operations.insert(operation, breaker);
    }

    pub fn for_operation(&self, operation: &str) -> Option<&Arc<CircuitBreaker>> {
        self.operations.get(operation)
    }

    pub fn get(&self, group: &str) -> Option<&Arc<CircuitBreaker>> {
        self.groups.get(group)
    }

    /// Gate check for a group. Unknown groups are unguarded and always admitted.
    pub fn admit(&self, group: &str) -> bool {
        self.get(group).map_or(true, |b| b.admit())
    }

    pub fn record_success(&self, group: &str) {
        if let Some(breaker) = self.get(group) {
            breaker.record_success();
        }
    }

    pub fn record_failure(&self, group: &str) {
        if let Some(breaker) = self.get(group) {
            breaker.record_failure();
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        self.groups.values().map(|b| b.snapshot()).collect()
    }
}
