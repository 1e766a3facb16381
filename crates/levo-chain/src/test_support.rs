//! Scripted chain doubles for exercising the executor and the cycle
//! pipeline without a node.

use std::collections::VecDeque;
use std::sync::Mutex;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use chrono::Utc;
use levo_models::{PositionSnapshot, RiskLevel, StepAction, TransactionStep};
use rust_decimal::Decimal;

use crate::error::{ChainReadError, ExecutionError};
use crate::gateway::{ChainGateway, Submission};
use crate::reader::PositionSource;

/// What the gateway does with the next submitted step.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Confirm, resolving to the given output (or the submitted amount).
    Confirm(Option<U256>),
    /// Reject at submission.
    FailSubmit(ExecutionError),
    /// Accept, then fail while confirming.
    FailConfirm(ExecutionError),
    /// Accept and never confirm.
    Hang,
    /// Never return from submission.
    HangSubmit,
}

/// A submission the gateway received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub action: StepAction,
    pub amount: U256,
    pub tx_hash: TxHash,
}

/// Gateway that plays back a script, one entry per submitted step.
/// Steps beyond the script confirm with their submitted amount.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<ScriptedStep>>,
    pending: Mutex<VecDeque<ScriptedStep>>,
    submissions: Mutex<Vec<RecordedSubmission>>,
}

impl ScriptedGateway {
    pub fn new(script: Vec<ScriptedStep>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Gateway that confirms everything with the submitted amount.
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_script(&self) -> ScriptedStep {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(ScriptedStep::Confirm(None))
    }
}

#[async_trait]
impl ChainGateway for ScriptedGateway {
    async fn submit(
        &self,
        _account: Address,
        step: &TransactionStep,
        amount: U256,
    ) -> Result<Submission, ExecutionError> {
        let scripted = match self.next_script() {
            ScriptedStep::FailSubmit(e) => return Err(e),
            ScriptedStep::HangSubmit => return std::future::pending().await,
            other => other,
        };

        let mut submissions = self.submissions.lock().unwrap_or_else(|e| e.into_inner());
        let tx_hash = TxHash::with_last_byte(submissions.len() as u8 + 1);
        submissions.push(RecordedSubmission {
            action: step.action,
            amount,
            tx_hash,
        });
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).push_back(scripted);
        Ok(Submission {
            tx_hash,
            quoted_output: None,
        })
    }

    async fn confirm(
        &self,
        _account: Address,
        _step: &TransactionStep,
        amount: U256,
        _submission: &Submission,
    ) -> Result<U256, ExecutionError> {
        let scripted = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(ScriptedStep::Confirm(None));
        match scripted {
            ScriptedStep::Confirm(output) => Ok(output.unwrap_or(amount)),
            ScriptedStep::FailConfirm(e) | ScriptedStep::FailSubmit(e) => Err(e),
            ScriptedStep::Hang | ScriptedStep::HangSubmit => std::future::pending().await,
        }
    }
}

/// Position source returning a fixed snapshot or a fixed error.
#[derive(Debug, Clone)]
pub struct StaticPositions {
    snapshot: Option<PositionSnapshot>,
    error: String,
}

impl StaticPositions {
    pub fn new(snapshot: PositionSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            error: String::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            snapshot: None,
            error: message.to_string(),
        }
    }
}

#[async_trait]
impl PositionSource for StaticPositions {
    async fn read(&self, account: Address) -> Result<PositionSnapshot, ChainReadError> {
        match &self.snapshot {
            Some(s) => Ok(PositionSnapshot {
                account,
                captured_at: Utc::now(),
                ..s.clone()
            }),
            None => Err(ChainReadError::Rpc(self.error.clone())),
        }
    }
}

/// A moderately leveraged position: $1000 collateral, $600 debt, HF 1.33.
pub fn sample_snapshot(account: Address) -> PositionSnapshot {
    let health_factor = Decimal::new(133, 2);
    PositionSnapshot {
        account,
        collateral_value: Decimal::new(1000, 0),
        debt_value: Decimal::new(600, 0),
        available_borrows: Decimal::new(150, 0),
        loan_to_value: Decimal::new(6, 1),
        max_loan_to_value: Decimal::new(75, 2),
        liquidation_threshold: Decimal::new(8, 1),
        health_factor,
        risk: RiskLevel::from_health_factor(health_factor),
        reserves: Vec::new(),
        wallet_balances: Vec::new(),
        captured_at: Utc::now(),
    }
}
