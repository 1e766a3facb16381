use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use levo_models::{
    BundleExecutionResult, BundleStatus, Decision, FailureKind, StepAmount, StepOutcome,
    StepReport, TransactionStep,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ExecutionError;
use crate::gateway::ChainGateway;

/// Runs a bundle step by step against a [`ChainGateway`].
///
/// Steps are strictly sequential: a step is only submitted once its
/// predecessor is confirmed. The first failure halts the bundle and every
/// later step is reported as skipped. Nothing is rolled back.
pub struct BundleExecutor {
    gateway: Arc<dyn ChainGateway>,
    submit_timeout: Duration,
    receipt_timeout: Duration,
}

impl BundleExecutor {
    /// Submission is bounded by `receipt_timeout` too unless
    /// [`with_submit_timeout`](Self::with_submit_timeout) says otherwise.
    pub fn new(gateway: Arc<dyn ChainGateway>, receipt_timeout: Duration) -> Self {
        Self {
            gateway,
            submit_timeout: receipt_timeout,
            receipt_timeout,
        }
    }

    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    /// Execute `steps` for `account`. Cancellation is checked between steps
    /// only; an in-flight step always runs to confirmation or failure.
    pub async fn execute(
        &self,
        account: Address,
        decision: Decision,
        steps: Vec<TransactionStep>,
        cancel: &CancellationToken,
    ) -> BundleExecutionResult {
        let mut reports: Vec<StepReport> = Vec::with_capacity(steps.len());
        let mut status = BundleStatus::Completed;

        for (index, step) in steps.into_iter().enumerate() {
            if status != BundleStatus::Completed {
                reports.push(skipped(index, step));
                continue;
            }
            if cancel.is_cancelled() {
                warn!(step = index, "Stop requested, aborting remaining steps");
                status = BundleStatus::Aborted;
                reports.push(skipped(index, step));
                continue;
            }

            let amount = match resolve_amount(index, &step, &reports) {
                Ok(amount) => amount,
                Err(e) => {
                    error!(step = index, error = %e, "Step amount could not be resolved");
                    status = BundleStatus::PartiallyFailed;
                    reports.push(StepReport {
                        index,
                        step,
                        submitted_amount: None,
                        outcome: failed(e),
                    });
                    continue;
                }
            };

            let outcome = self.run_step(account, index, &step, amount).await;
            if !outcome.is_confirmed() {
                status = BundleStatus::PartiallyFailed;
            }
            reports.push(StepReport {
                index,
                step,
                submitted_amount: Some(amount),
                outcome,
            });
        }

        let result = BundleExecutionResult {
            decision,
            steps: reports,
            status,
        };
        info!(
            status = %result.status,
            confirmed = result.confirmed_count(),
            total = result.steps.len(),
            "Bundle finished"
        );
        result
    }

    async fn run_step(
        &self,
        account: Address,
        index: usize,
        step: &TransactionStep,
        amount: U256,
    ) -> StepOutcome {
        info!(step = index, action = %step.action, amount = %amount, "Step pending");

        let submission = tokio::time::timeout(
            self.submit_timeout,
            self.gateway.submit(account, step, amount),
        )
        .await;
        let submission = match submission {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                error!(step = index, action = %step.action, error = %e, "Step submission failed");
                return failed(e);
            }
            Err(_) => {
                error!(
                    step = index,
                    action = %step.action,
                    timeout_secs = self.submit_timeout.as_secs(),
                    "Step submission timed out"
                );
                return failed(ExecutionError::new(
                    FailureKind::Timeout,
                    format!("submission not accepted within {}s", self.submit_timeout.as_secs()),
                ));
            }
        };
        info!(step = index, tx_hash = %submission.tx_hash, "Step submitted");

        let confirmation = tokio::time::timeout(
            self.receipt_timeout,
            self.gateway.confirm(account, step, amount, &submission),
        )
        .await;

        match confirmation {
            Ok(Ok(resolved)) => {
                info!(
                    step = index,
                    tx_hash = %submission.tx_hash,
                    resolved_output = %resolved,
                    "Step confirmed"
                );
                StepOutcome::Confirmed {
                    tx_hash: submission.tx_hash,
                    resolved_output_amount: resolved,
                }
            }
            Ok(Err(e)) => {
                error!(step = index, tx_hash = %submission.tx_hash, error = %e, "Step failed");
                failed(e)
            }
            Err(_) => {
                error!(
                    step = index,
                    tx_hash = %submission.tx_hash,
                    timeout_secs = self.receipt_timeout.as_secs(),
                    "Receipt wait timed out"
                );
                failed(ExecutionError::new(
                    FailureKind::Timeout,
                    format!(
                        "no receipt for {} within {}s",
                        submission.tx_hash,
                        self.receipt_timeout.as_secs()
                    ),
                ))
            }
        }
    }
}

fn resolve_amount(
    index: usize,
    step: &TransactionStep,
    reports: &[StepReport],
) -> Result<U256, ExecutionError> {
    match step.amount {
        StepAmount::Literal(amount) => Ok(amount),
        StepAmount::OutputOf(k) if k >= index => Err(ExecutionError::new(
            FailureKind::Unknown(format!("step {index} references step {k}")),
            "amount reference must point to an earlier step",
        )),
        StepAmount::OutputOf(k) => reports
            .get(k)
            .and_then(|r| r.outcome.resolved_output())
            .ok_or_else(|| {
                ExecutionError::new(
                    FailureKind::Unknown(format!("step {k} has no resolved output")),
                    "referenced step did not confirm",
                )
            }),
    }
}

fn skipped(index: usize, step: TransactionStep) -> StepReport {
    StepReport {
        index,
        step,
        submitted_amount: None,
        outcome: StepOutcome::Skipped,
    }
}

fn failed(e: ExecutionError) -> StepOutcome {
    StepOutcome::Failed {
        kind: e.kind,
        message: e.message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levo_models::bundle::protocols;
    use levo_models::StepAction;

    fn step(amount: StepAmount) -> TransactionStep {
        TransactionStep {
            protocol: protocols::LENDING.to_string(),
            action: StepAction::Repay,
            input_asset: Address::ZERO,
            output_asset: None,
            amount,
            target: Address::ZERO,
        }
    }

    #[test]
    fn forward_reference_is_rejected() {
        let err = resolve_amount(0, &step(StepAmount::OutputOf(0)), &[]).unwrap_err();
        assert!(matches!(err.kind, FailureKind::Unknown(_)));
        let err = resolve_amount(1, &step(StepAmount::OutputOf(3)), &[]).unwrap_err();
        assert!(matches!(err.kind, FailureKind::Unknown(_)));
    }

    #[test]
    fn reference_resolves_confirmed_output() {
        let reports = vec![StepReport {
            index: 0,
            step: step(StepAmount::Literal(U256::from(10_000u64))),
            submitted_amount: Some(U256::from(10_000u64)),
            outcome: StepOutcome::Confirmed {
                tx_hash: Default::default(),
                resolved_output_amount: U256::from(9_950u64),
            },
        }];
        assert_eq!(
            resolve_amount(1, &step(StepAmount::OutputOf(0)), &reports).unwrap(),
            U256::from(9_950u64)
        );
    }
}
