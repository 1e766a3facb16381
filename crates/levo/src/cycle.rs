use std::sync::Arc;

use alloy::primitives::Address;
use levo_agents::{Advisor, AdvisoryError, SignalSource};
use levo_chain::{BundleBuilder, BundleExecutor, PositionSource};
use levo_models::{
    BundleExecutionResult, Channel, Decision, MarketSignal, Notification, PositionSnapshot,
    SessionId,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::error::CycleError;
use crate::notify::{system, NotificationSink};

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The decision was carried out; `Hold` yields an empty completed bundle.
    Executed(BundleExecutionResult),
    /// A stage failed; no bundle was started.
    StageFailed(String),
    /// Stop was requested before a bundle was started.
    Stopped,
}

/// One rebalancing cycle: signal + position, advice, bundle, execution.
pub struct CyclePipeline {
    signals: Arc<dyn SignalSource>,
    positions: Arc<dyn PositionSource>,
    advisor: Arc<dyn Advisor>,
    builder: BundleBuilder,
    executor: BundleExecutor,
    sink: Arc<dyn NotificationSink>,
}

impl CyclePipeline {
    pub fn new(
        signals: Arc<dyn SignalSource>,
        positions: Arc<dyn PositionSource>,
        advisor: Arc<dyn Advisor>,
        builder: BundleBuilder,
        executor: BundleExecutor,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            signals,
            positions,
            advisor,
            builder,
            executor,
            sink,
        }
    }

    pub async fn notify(&self, notification: Notification) {
        self.sink.notify(notification).await;
    }

    /// Run one cycle. Stage failures are reported and folded into the
    /// outcome; they never propagate to the session.
    pub async fn run_cycle(
        &self,
        session: &SessionId,
        account: Address,
        cycle: u64,
        cancel: &CancellationToken,
    ) -> CycleOutcome {
        let span = info_span!("cycle", session_id = %session, cycle);
        async {
            match self.try_cycle(session, account, cycle, cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "Cycle stage failed");
                    self.notify(system(session, format!("Cycle {cycle} failed: {e}")))
                        .await;
                    CycleOutcome::StageFailed(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_cycle(
        &self,
        session: &SessionId,
        account: Address,
        cycle: u64,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome, CycleError> {
        if cancel.is_cancelled() {
            return Ok(CycleOutcome::Stopped);
        }
        info!(account = %account, "Cycle started");
        self.notify(system(
            session,
            format!("Cycle {cycle}: reading position and market signal"),
        ))
        .await;

        let (signal, snapshot) = tokio::try_join!(
            async { self.signals.fetch().await.map_err(CycleError::from) },
            async { self.positions.read(account).await.map_err(CycleError::from) },
        )?;
        self.notify(system(session, describe_state(&snapshot, &signal)))
            .await;

        let advice = match self.advisor.decide(&snapshot, &signal, cancel).await {
            Err(AdvisoryError::Cancelled) => {
                info!("Advisor wait cancelled by stop");
                return Ok(CycleOutcome::Stopped);
            }
            other => other?,
        };
        if let Some(text) = &advice.text {
            self.notify(Notification::new(session.clone(), Channel::Advisor, text.clone()))
                .await;
        }

        let decision = advice.decision;
        let steps = self.builder.build(&decision)?;

        if cancel.is_cancelled() {
            info!(decision = %decision, "Stop requested, bundle not started");
            self.notify(system(
                session,
                format!("Stop requested; {decision} was not executed"),
            ))
            .await;
            return Ok(CycleOutcome::Stopped);
        }

        self.notify(system(session, describe_decision(&decision, steps.len())))
            .await;

        let result = self.executor.execute(account, decision, steps, cancel).await;
        if !decision.is_hold() {
            self.notify(system(session, result.summary())).await;
        }
        Ok(CycleOutcome::Executed(result))
    }
}

fn describe_state(snapshot: &PositionSnapshot, signal: &MarketSignal) -> String {
    let health = if snapshot.has_debt() {
        format!(
            "health factor {} ({:?} risk)",
            snapshot.health_factor.round_dp(2),
            snapshot.risk
        )
    } else {
        "no debt".to_string()
    };
    format!(
        "Position: collateral {}, debt {}, {health}. Market: {} (volatility {})",
        snapshot.collateral_value.round_dp(2),
        snapshot.debt_value.round_dp(2),
        signal.classification,
        signal.volatility
    )
}

fn describe_decision(decision: &Decision, steps: usize) -> String {
    match decision {
        Decision::Hold => "Decision: hold. Position unchanged, no transactions submitted".to_string(),
        other => format!("Decision: {other}. Executing {steps} step bundle"),
    }
}
