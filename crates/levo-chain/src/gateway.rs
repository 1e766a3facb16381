use std::sync::Arc;
use std::time::Duration;

use alloy::network::{ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use levo_models::{FailureKind, StepAction, TransactionStep};
use tracing::{debug, warn};

use crate::contracts::{IERC20, IPool, VARIABLE_RATE_MODE};
use crate::error::ExecutionError;
use crate::nonce::NonceSequencer;
use crate::router::RouteClient;

/// A transaction accepted by the node but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub tx_hash: TxHash,
    /// Output amount quoted when the step was encoded, for route legs.
    pub quoted_output: Option<U256>,
}

/// Submits bundle steps and waits for their receipts.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn submit(
        &self,
        account: Address,
        step: &TransactionStep,
        amount: U256,
    ) -> Result<Submission, ExecutionError>;

    /// Wait for the receipt and return the step's resolved output amount.
    /// Does not time out on its own; callers bound the wait.
    async fn confirm(
        &self,
        account: Address,
        step: &TransactionStep,
        amount: U256,
        submission: &Submission,
    ) -> Result<U256, ExecutionError>;
}

struct EncodedCall {
    to: Address,
    input: Bytes,
    value: U256,
    quoted_output: Option<U256>,
}

/// Live gateway over an alloy wallet provider and the routing API.
pub struct AlloyGateway {
    provider: DynProvider,
    router: RouteClient,
    nonces: Arc<NonceSequencer>,
    poll_interval: Duration,
}

impl AlloyGateway {
    pub fn new(
        provider: DynProvider,
        router: RouteClient,
        nonces: Arc<NonceSequencer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider,
            router,
            nonces,
            poll_interval,
        }
    }

    async fn encode(
        &self,
        account: Address,
        step: &TransactionStep,
        amount: U256,
    ) -> Result<EncodedCall, ExecutionError> {
        if let Some(call) = encode_direct(account, step, amount) {
            return Ok(call);
        }
        let output = step.output_asset.ok_or_else(|| {
            ExecutionError::new(
                FailureKind::Unknown("route step without output asset".to_string()),
                "route step without output asset",
            )
        })?;
        let quote = self
            .router
            .quote(account, step.input_asset, output, amount)
            .await?;
        Ok(EncodedCall {
            to: quote.to,
            input: quote.data,
            value: quote.value,
            quoted_output: Some(quote.amount_out),
        })
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> TransactionReceipt {
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ChainGateway for AlloyGateway {
    async fn submit(
        &self,
        account: Address,
        step: &TransactionStep,
        amount: U256,
    ) -> Result<Submission, ExecutionError> {
        let call = self.encode(account, step, amount).await?;
        let quoted_output = call.quoted_output;

        let provider = &self.provider;
        let tx_hash = self
            .nonces
            .submit_with(
                || async move {
                    provider
                        .get_transaction_count(account)
                        .pending()
                        .await
                        .map_err(|e| ExecutionError::from_message(e.to_string()))
                },
                |nonce| async move {
                    let request = TransactionRequest::default()
                        .with_from(account)
                        .with_to(call.to)
                        .with_input(call.input)
                        .with_value(call.value)
                        .with_nonce(nonce);
                    let pending = provider
                        .send_transaction(request)
                        .await
                        .map_err(|e| ExecutionError::from_message(e.to_string()))?;
                    debug!(nonce, tx_hash = %pending.tx_hash(), "Transaction sent");
                    Ok(*pending.tx_hash())
                },
            )
            .await?;

        Ok(Submission {
            tx_hash,
            quoted_output,
        })
    }

    async fn confirm(
        &self,
        account: Address,
        step: &TransactionStep,
        amount: U256,
        submission: &Submission,
    ) -> Result<U256, ExecutionError> {
        let receipt = self.wait_for_receipt(submission.tx_hash).await;
        if !receipt.status() {
            return Err(ExecutionError::new(
                FailureKind::Reverted("transaction reverted on-chain".to_string()),
                format!("receipt status 0 for {}", submission.tx_hash),
            ));
        }

        if step.action != StepAction::Route {
            return Ok(amount);
        }

        let received = step
            .output_asset
            .map(|asset| received_amount(&receipt, asset, account))
            .unwrap_or(U256::ZERO);
        if !received.is_zero() {
            return Ok(received);
        }

        warn!(
            tx_hash = %submission.tx_hash,
            "No output transfer in receipt, falling back to quoted amount"
        );
        Ok(submission.quoted_output.unwrap_or(amount))
    }
}

/// Calldata for every step that needs no routing quote (`None` for routes).
/// Pool calls act on behalf of `account`; approvals go to the token with the
/// step's target as spender.
fn encode_direct(account: Address, step: &TransactionStep, amount: U256) -> Option<EncodedCall> {
    let rate_mode = U256::from(VARIABLE_RATE_MODE);
    let input = match step.action {
        StepAction::Route => return None,
        StepAction::Approve => {
            return Some(EncodedCall {
                to: step.input_asset,
                input: IERC20::approveCall {
                    spender: step.target,
                    amount,
                }
                .abi_encode()
                .into(),
                value: U256::ZERO,
                quoted_output: None,
            });
        }
        StepAction::Deposit => IPool::supplyCall {
            asset: step.input_asset,
            amount,
            onBehalfOf: account,
            referralCode: 0,
        }
        .abi_encode(),
        StepAction::Borrow => IPool::borrowCall {
            asset: step.input_asset,
            amount,
            interestRateMode: rate_mode,
            referralCode: 0,
            onBehalfOf: account,
        }
        .abi_encode(),
        StepAction::Repay => IPool::repayCall {
            asset: step.input_asset,
            amount,
            interestRateMode: rate_mode,
            onBehalfOf: account,
        }
        .abi_encode(),
        StepAction::Redeem => IPool::withdrawCall {
            asset: step.input_asset,
            amount,
            to: account,
        }
        .abi_encode(),
    };
    Some(EncodedCall {
        to: step.target,
        input: input.into(),
        value: U256::ZERO,
        quoted_output: None,
    })
}

/// Sum of `asset` transferred to `recipient` in the receipt's logs.
fn received_amount(receipt: &TransactionReceipt, asset: Address, recipient: Address) -> U256 {
    receipt
        .inner
        .logs()
        .iter()
        .filter(|log| log.address() == asset)
        .filter_map(|log| log.log_decode::<IERC20::Transfer>().ok())
        .filter(|transfer| transfer.inner.data.to == recipient)
        .fold(U256::ZERO, |acc, transfer| {
            acc.saturating_add(transfer.inner.data.value)
        })
}
