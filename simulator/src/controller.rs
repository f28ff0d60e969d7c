//! Simulation controller.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use tokenvault_common::{Payment, Ratio, WorkId};
use tokenvault_ledger::{Journal, JournalEntry, LedgerError, Operation, SettlementGuard, TokenLedger};

use crate::config::SimulationConfig;
use crate::metrics::SimulationMetrics;
use crate::recipient::Recipient;
use crate::scenario::{Scenario, ScenarioStep};

/// How a unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Ledger settled into the recipient.
    Committed,
    /// A ledger error aborted the call; incoming payments were refunded.
    Aborted,
}

/// Result of running one scenario as a unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct WorkOutcome {
    /// Unit-of-work identifier.
    pub work_id: WorkId,
    /// Scenario name.
    pub scenario: String,
    /// Final status.
    pub status: WorkStatus,
    /// Operations applied successfully.
    pub operations: usize,
    /// Operations rejected as expected.
    pub expected_failures: usize,
    /// Payments settled to the recipient.
    pub settled: Vec<Payment>,
    /// Payments refunded after an abort.
    pub refunded: Vec<Payment>,
    /// Movements recorded during the call.
    pub journal: Vec<JournalEntry>,
    /// Error that aborted the call.
    pub error: Option<String>,
    /// Whether journal totals matched the ledger before settlement.
    pub reconciled: bool,
}

/// What a step did to the unit of work.
enum StepOutcome {
    Applied,
    ExpectedFailure,
    Checked,
    Abort(LedgerError),
}

/// Run one scenario against a fresh ledger, settling into `recipient`.
///
/// Ledger errors abort the unit of work and refund the incoming payments.
/// Failed assertions are returned as errors; the incoming payments are
/// refunded in that case too and nothing is settled.
pub fn execute(scenario: &Scenario, recipient: &mut Recipient) -> anyhow::Result<WorkOutcome> {
    let work = WorkId::new();
    let ledger: TokenLedger = TokenLedger::from_batch(scenario.incoming.iter().cloned());
    let mut journal = Journal::opening(&ledger);
    let mut guard = SettlementGuard::new(work, ledger, &mut *recipient);

    let mut operations = 0;
    let mut expected_failures = 0;

    for step in &scenario.steps {
        let outcome = match execute_step(&mut guard, &mut journal, step) {
            Ok(outcome) => outcome,
            Err(err) => {
                guard.discard();
                recipient.refund(work, &scenario.incoming);
                return Err(err.context(format!("Scenario {} failed", scenario.name)));
            }
        };

        match outcome {
            StepOutcome::Applied => operations += 1,
            StepOutcome::ExpectedFailure => expected_failures += 1,
            StepOutcome::Checked => {}
            StepOutcome::Abort(err) => {
                warn!(
                    work_id = %work,
                    scenario = %scenario.name,
                    code = err.error_code(),
                    error = %err,
                    "Unit of work aborted"
                );

                let ledger = guard.discard();
                let reconciled = journal.is_reconciled(&ledger);
                recipient.refund(work, &scenario.incoming);

                return Ok(WorkOutcome {
                    work_id: work,
                    scenario: scenario.name.clone(),
                    status: WorkStatus::Aborted,
                    operations,
                    expected_failures,
                    settled: Vec::new(),
                    refunded: scenario.incoming.clone(),
                    journal: journal.entries().to_vec(),
                    error: Some(err.to_string()),
                    reconciled,
                });
            }
        }
    }

    let reconciled = journal.is_reconciled(&guard);
    let settled = guard.settle_all();
    guard.finish()?;

    Ok(WorkOutcome {
        work_id: work,
        scenario: scenario.name.clone(),
        status: WorkStatus::Committed,
        operations,
        expected_failures,
        settled,
        refunded: Vec::new(),
        journal: journal.entries().to_vec(),
        error: None,
        reconciled,
    })
}

fn execute_step(
    ledger: &mut TokenLedger,
    journal: &mut Journal,
    step: &ScenarioStep,
) -> anyhow::Result<StepOutcome> {
    match step {
        ScenarioStep::Apply(op) => Ok(apply(ledger, journal, op)),
        ScenarioStep::TakeFee {
            token,
            rate,
            rounding,
        } => {
            let op = Operation::WithdrawPercentage {
                token: token.clone(),
                ratio: Ratio::from_decimal(*rate)?,
                rounding: *rounding,
            };
            Ok(apply(ledger, journal, &op))
        }
        ScenarioStep::ExpectFailure(op) => match journal.record(ledger, op) {
            Err(_) => Ok(StepOutcome::ExpectedFailure),
            Ok(moved) => Err(anyhow::anyhow!(
                "Expected {} of {} to fail, but it moved {}",
                op.kind(),
                op.token(),
                moved
            )),
        },
        ScenarioStep::AssertBalance { token, amount } => {
            let actual = ledger.balance_of(token);
            anyhow::ensure!(
                actual == *amount,
                "Balance of {}: expected {}, got {}",
                token,
                amount,
                actual
            );
            Ok(StepOutcome::Checked)
        }
        ScenarioStep::AssertSettlement(expected) => {
            let actual = ledger.settle_all();
            anyhow::ensure!(
                actual == *expected,
                "Settlement mismatch: expected [{}], got [{}]",
                join(expected),
                join(&actual)
            );
            Ok(StepOutcome::Checked)
        }
    }
}

fn apply(ledger: &mut TokenLedger, journal: &mut Journal, op: &Operation) -> StepOutcome {
    match journal.record(ledger, op) {
        Ok(_) => StepOutcome::Applied,
        Err(err) => StepOutcome::Abort(err),
    }
}

fn join(payments: &[Payment]) -> String {
    payments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Controls the simulation.
pub struct SimulationController {
    /// Configuration.
    config: SimulationConfig,
    /// Shared across worker tasks.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Accumulated transfers and refunds.
    recipient: Recipient,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            recipient: Recipient::new(),
        }
    }

    /// Run a scenario as a single unit of work.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<WorkOutcome> {
        info!(
            scenario = %scenario.name,
            description = %scenario.description,
            incoming = scenario.incoming.len(),
            steps = scenario.steps.len(),
            "Running scenario"
        );

        let started = Instant::now();
        let outcome = execute(scenario, &mut self.recipient)?;
        self.metrics.write().await.record(&outcome, started.elapsed());

        info!(
            scenario = %scenario.name,
            status = ?outcome.status,
            settled = outcome.settled.len(),
            "Scenario finished"
        );

        Ok(outcome)
    }

    /// Run randomized units of work across worker tasks.
    ///
    /// Every unit of work owns its ledger; workers share only the metrics.
    pub async fn run_random(&mut self) -> anyhow::Result<Vec<WorkOutcome>> {
        self.config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let workers = self.config.concurrency.min(self.config.runs.max(1));

        info!(
            runs = self.config.runs,
            workers,
            seed,
            "Running randomized units of work"
        );

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let metrics = self.metrics.clone();
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(worker as u64));
                let mut recipient = Recipient::new();
                let mut outcomes = Vec::new();

                for run in (worker..config.runs).step_by(workers) {
                    let scenario =
                        Scenario::random(&mut rng, run, config.max_tokens, config.max_steps);
                    let started = Instant::now();
                    let outcome = execute(&scenario, &mut recipient)?;
                    metrics.write().await.record(&outcome, started.elapsed());
                    outcomes.push(outcome);
                }

                anyhow::Ok((recipient, outcomes))
            }));
        }

        let mut outcomes = Vec::with_capacity(self.config.runs);
        for handle in handles {
            let (recipient, worker_outcomes) = handle.await??;
            self.recipient.merge(recipient);
            outcomes.extend(worker_outcomes);
        }

        let unreconciled = outcomes.iter().filter(|o| !o.reconciled).count();
        anyhow::ensure!(
            unreconciled == 0,
            "{} units of work failed journal reconciliation",
            unreconciled
        );

        Ok(outcomes)
    }

    /// Get simulation metrics.
    pub async fn metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    /// Recipient totals so far.
    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }
}
