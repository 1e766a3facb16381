use std::fmt;

use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::decision::Decision;

/// Protocol identifiers used on bundle steps.
pub mod protocols {
    pub const ERC20: &str = "erc20";
    pub const ROUTER: &str = "enso";
    pub const LENDING: &str = "aave-v3";
}

/// What a single step does on-chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Approve,
    Route,
    Deposit,
    Borrow,
    Repay,
    Redeem,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Approve => "approve",
            StepAction::Route => "route",
            StepAction::Deposit => "deposit",
            StepAction::Borrow => "borrow",
            StepAction::Repay => "repay",
            StepAction::Redeem => "redeem",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either a literal amount or the resolved output of an earlier step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepAmount {
    Literal(U256),
    OutputOf(usize),
}

/// One on-chain operation in a bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionStep {
    pub protocol: String,
    pub action: StepAction,
    pub input_asset: Address,
    pub output_asset: Option<Address>,
    pub amount: StepAmount,
    /// Contract the step acts on: the router or lending pool, or for an
    /// approval the spender being approved on `input_asset`.
    pub target: Address,
}

impl TransactionStep {
    /// The index this step reads its amount from, if any.
    pub fn referenced_step(&self) -> Option<usize> {
        match self.amount {
            StepAmount::OutputOf(index) => Some(index),
            StepAmount::Literal(_) => None,
        }
    }
}

/// Classification of a failed step, surfaced to the caller as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientFunds,
    GasEstimationFailed,
    NonceConflict,
    Underpriced,
    Reverted(String),
    Timeout,
    Unknown(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InsufficientFunds => f.write_str("insufficient funds"),
            FailureKind::GasEstimationFailed => f.write_str("gas estimation failed"),
            FailureKind::NonceConflict => f.write_str("nonce conflict"),
            FailureKind::Underpriced => f.write_str("transaction underpriced"),
            FailureKind::Reverted(reason) => write!(f, "reverted: {reason}"),
            FailureKind::Timeout => f.write_str("receipt timeout"),
            FailureKind::Unknown(raw) => write!(f, "unknown: {raw}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Confirmed {
        tx_hash: TxHash,
        resolved_output_amount: U256,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
    Skipped,
}

impl StepOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, StepOutcome::Confirmed { .. })
    }

    pub fn resolved_output(&self) -> Option<U256> {
        match self {
            StepOutcome::Confirmed {
                resolved_output_amount,
                ..
            } => Some(*resolved_output_amount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepReport {
    pub index: usize,
    pub step: TransactionStep,
    /// Amount actually submitted, once the reference was resolved.
    pub submitted_amount: Option<U256>,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    /// Every step confirmed (trivially true for an empty bundle).
    Completed,
    /// A step failed; every later step was skipped.
    PartiallyFailed,
    /// Stop was requested before the bundle finished.
    Aborted,
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleStatus::Completed => f.write_str("completed"),
            BundleStatus::PartiallyFailed => f.write_str("partially failed"),
            BundleStatus::Aborted => f.write_str("aborted"),
        }
    }
}

/// Outcome of executing one bundle. Reported at cycle end, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleExecutionResult {
    pub decision: Decision,
    pub steps: Vec<StepReport>,
    pub status: BundleStatus,
}

impl BundleExecutionResult {
    pub fn confirmed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_confirmed()).count()
    }

    pub fn first_failure(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }

    /// One-line human readable summary for notification sinks.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Bundle for {} {}: {}/{} steps confirmed",
            self.decision,
            self.status,
            self.confirmed_count(),
            self.steps.len()
        );
        if let Some(failed) = self.first_failure() {
            if let StepOutcome::Failed { kind, .. } = &failed.outcome {
                text.push_str(&format!(
                    "; step {} ({}) failed: {kind}",
                    failed.index, failed.step.action
                ));
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(action: StepAction, amount: StepAmount) -> TransactionStep {
        TransactionStep {
            protocol: protocols::LENDING.to_string(),
            action,
            input_asset: Address::ZERO,
            output_asset: None,
            amount,
            target: Address::ZERO,
        }
    }

    #[test]
    fn referenced_step_only_for_output_refs() {
        assert_eq!(
            step(StepAction::Repay, StepAmount::OutputOf(0)).referenced_step(),
            Some(0)
        );
        assert_eq!(
            step(StepAction::Route, StepAmount::Literal(U256::from(1u64))).referenced_step(),
            None
        );
    }

    #[test]
    fn failure_kind_serialization() {
        let json = serde_json::to_value(FailureKind::Reverted("STF".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "reverted", "detail": "STF"}));
        let json = serde_json::to_value(FailureKind::Timeout).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "timeout"}));
    }

    #[test]
    fn summary_mentions_first_failure() {
        let result = BundleExecutionResult {
            decision: Decision::Deleverage {
                amount: U256::from(10_000u64),
            },
            steps: vec![
                StepReport {
                    index: 0,
                    step: step(StepAction::Route, StepAmount::Literal(U256::from(10_000u64))),
                    submitted_amount: Some(U256::from(10_000u64)),
                    outcome: StepOutcome::Failed {
                        kind: FailureKind::InsufficientFunds,
                        message: "insufficient funds for gas".to_string(),
                    },
                },
                StepReport {
                    index: 1,
                    step: step(StepAction::Repay, StepAmount::OutputOf(0)),
                    submitted_amount: None,
                    outcome: StepOutcome::Skipped,
                },
            ],
            status: BundleStatus::PartiallyFailed,
        };

        assert_eq!(result.confirmed_count(), 0);
        let summary = result.summary();
        assert!(summary.contains("partially failed"));
        assert!(summary.contains("step 0 (route) failed: insufficient funds"));
    }

    #[test]
    fn empty_bundle_summary() {
        let result = BundleExecutionResult {
            decision: Decision::Hold,
            steps: vec![],
            status: BundleStatus::Completed,
        };
        assert_eq!(result.summary(), "Bundle for hold completed: 0/0 steps confirmed");
        assert!(result.first_failure().is_none());
    }
}
