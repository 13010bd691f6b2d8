//! The fetch → evaluate → format → notify → sleep control loop.
//!
//! Cycles run strictly one after another. The interval is slept after a
//! cycle finishes, so slow remotes stretch the period instead of causing
//! overlap. Per-cycle failures are logged and never end the loop; only the
//! cancellation token does.

use super::evaluator::ThresholdEvaluator;
use super::formatter::AlertFormatter;
use crate::exchange::BalanceSource;
use crate::limits::LimitRegistry;
use crate::notify::AlertSink;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Evaluating,
    Alerting,
    Skipping,
    Sleeping,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Fetching => "fetching",
            LoopState::Evaluating => "evaluating",
            LoopState::Alerting => "alerting",
            LoopState::Skipping => "skipping",
            LoopState::Sleeping => "sleeping",
            LoopState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Result of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetch did not return usable data
    NoData { status: u16 },
    /// Every configured balance is within range
    AllInRange { checked: usize },
    /// Violations found and delivered
    Alerted { violations: usize },
    /// Violations found but the alert could not be delivered
    AlertFailed { violations: usize },
}

/// Orchestrates the monitor's components.
pub struct PollLoop {
    source: Arc<dyn BalanceSource>,
    registry: Arc<LimitRegistry>,
    sink: Arc<dyn AlertSink>,
    evaluator: ThresholdEvaluator,
    formatter: AlertFormatter,
    interval: Duration,
    state: watch::Sender<LoopState>,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn BalanceSource>,
        registry: Arc<LimitRegistry>,
        sink: Arc<dyn AlertSink>,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            source,
            registry,
            sink,
            evaluator: ThresholdEvaluator::new(),
            formatter: AlertFormatter::new(),
            interval,
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LoopState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("Poll loop {} -> {}", prev, next);
        }
    }

    /// Run one fetch/evaluate/notify cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.transition(LoopState::Fetching);
        let snapshot = self.source.snapshot().await;

        if !snapshot.is_success() {
            self.transition(LoopState::Skipping);
            info!("⏭️  [CYCLE] No balance data this cycle (status {})", snapshot.status);
            return CycleOutcome::NoData {
                status: snapshot.status,
            };
        }

        self.transition(LoopState::Evaluating);
        let limits = self.registry.table();
        let violations = self.evaluator.evaluate(&snapshot, &limits);

        if violations.is_empty() {
            self.transition(LoopState::Skipping);
            info!("✅ Script Running: All currencies are in the acceptable range!");
            return CycleOutcome::AllInRange {
                checked: snapshot.entries.len(),
            };
        }

        self.transition(LoopState::Alerting);
        let payload = self.formatter.format(&violations);
        match self.sink.send(&payload).await {
            Ok(()) => CycleOutcome::Alerted {
                violations: violations.len(),
            },
            Err(e) => {
                error!("❌ [ALERT] Failed to deliver {} warnings: {}", violations.len(), e);
                CycleOutcome::AlertFailed {
                    violations: violations.len(),
                }
            }
        }
    }

    /// Run cycles until `cancel` fires. Returns the number of completed cycles.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        info!(
            interval_secs = self.interval.as_secs(),
            "🚀 Starting balance monitor loop"
        );

        let mut cycles: u64 = 0;

        while !cancel.is_cancelled() {
            let started = Instant::now();
            let outcome = self.run_cycle().await;
            cycles += 1;
            debug!(
                cycle = cycles,
                ?outcome,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Cycle complete"
            );

            self.transition(LoopState::Sleeping);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.transition(LoopState::Idle);
        }

        self.transition(LoopState::Stopped);
        info!("👋 Poll loop stopped after {} cycles", cycles);
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, NotifyError};
    use crate::exchange::{BalanceEntry, BalanceSnapshot, MockBalanceSource};
    use crate::limits::{LimitEntry, LimitSource, LimitTable};
    use crate::notify::MockAlertSink;
    use rust_decimal_macros::dec;

    struct StaticLimits(LimitTable);

    impl LimitSource for StaticLimits {
        fn load(&self) -> Result<LimitTable, ConfigError> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn registry() -> Arc<LimitRegistry> {
        let mut table = LimitTable::new();
        table.insert(
            "binance",
            "usdt",
            LimitEntry::new(Some(dec!(100)), Some(dec!(1000))),
        );
        Arc::new(
            LimitRegistry::load(Arc::new(StaticLimits(table)), Duration::from_secs(3600)).unwrap(),
        )
    }

    fn source_returning(snapshot: BalanceSnapshot) -> MockBalanceSource {
        let mut source = MockBalanceSource::new();
        source.expect_snapshot().returning(move || snapshot.clone());
        source
    }

    fn poll_loop(source: MockBalanceSource, sink: MockAlertSink, interval: Duration) -> PollLoop {
        PollLoop::new(Arc::new(source), registry(), Arc::new(sink), interval)
    }

    fn low_balance() -> BalanceSnapshot {
        BalanceSnapshot::ok(vec![BalanceEntry::new("Binance", "USDT", dec!(50))])
    }

    #[tokio::test]
    async fn test_failed_fetch_sends_nothing() {
        let mut sink = MockAlertSink::new();
        sink.expect_send().times(0);

        let poll = poll_loop(
            source_returning(BalanceSnapshot::failed()),
            sink,
            Duration::from_secs(180),
        );

        assert_eq!(poll.run_cycle().await, CycleOutcome::NoData { status: 500 });
        assert_eq!(poll.state(), LoopState::Skipping);
    }

    #[tokio::test]
    async fn test_in_range_sends_nothing() {
        let mut sink = MockAlertSink::new();
        sink.expect_send().times(0);

        let snapshot = BalanceSnapshot::ok(vec![
            BalanceEntry::new("binance", "usdt", dec!(500)),
            BalanceEntry::new("kraken", "btc", dec!(0)),
        ]);
        let poll = poll_loop(source_returning(snapshot), sink, Duration::from_secs(180));

        assert_eq!(
            poll.run_cycle().await,
            CycleOutcome::AllInRange { checked: 2 }
        );
    }

    #[tokio::test]
    async fn test_violation_is_sent_once() {
        let mut sink = MockAlertSink::new();
        sink.expect_send()
            .withf(|payload| {
                payload.fallback_lines.len() == 1
                    && payload.fallback_lines[0].contains("is below for 'USDT' on Binance")
            })
            .times(1)
            .returning(|_| Ok(()));

        let poll = poll_loop(source_returning(low_balance()), sink, Duration::from_secs(180));

        assert_eq!(
            poll.run_cycle().await,
            CycleOutcome::Alerted { violations: 1 }
        );
        assert_eq!(poll.state(), LoopState::Alerting);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_contained() {
        let mut sink = MockAlertSink::new();
        sink.expect_send()
            .returning(|_| Err(NotifyError::HttpStatus(502)));

        let poll = poll_loop(source_returning(low_balance()), sink, Duration::from_millis(10));

        assert_eq!(
            poll.run_cycle().await,
            CycleOutcome::AlertFailed { violations: 1 }
        );

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        let cycles = poll.run(cancel).await;
        assert!(cycles >= 2, "loop stopped early after {cycles} cycles");
        assert_eq!(poll.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let mut sink = MockAlertSink::new();
        sink.expect_send().times(0);

        let poll = Arc::new(poll_loop(
            source_returning(BalanceSnapshot::failed()),
            sink,
            Duration::from_secs(3600),
        ));
        let mut states = poll.subscribe();
        let cancel = CancellationToken::new();

        let handle = {
            let poll = poll.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { poll.run(cancel).await })
        };

        states
            .wait_for(|s| *s == LoopState::Sleeping)
            .await
            .unwrap();
        cancel.cancel();

        let cycles = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop while sleeping")
            .unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(poll.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_no_cycles() {
        let mut source = MockBalanceSource::new();
        source.expect_snapshot().times(0);
        let mut sink = MockAlertSink::new();
        sink.expect_send().times(0);

        let poll = poll_loop(source, sink, Duration::from_secs(1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(poll.run(cancel).await, 0);
        assert_eq!(poll.state(), LoopState::Stopped);
    }
}
