//! Scripted signal and advisor doubles, so cycle scenarios run with no network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use levo_models::{Advice, Decision, MarketSignal, PositionSnapshot};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::advisor::Advisor;
use crate::error::{AdvisoryError, SignalFetchError};
use crate::signals::SignalSource;

/// A calm `lowvol` market.
pub fn sample_signal() -> MarketSignal {
    MarketSignal {
        volatility: Decimal::new(23, 4),
        classification: "lowvol".to_string(),
        description: "ETH price in low price fluctuations enabling to take more risk.".to_string(),
        predicted_at: Utc::now(),
    }
}

/// One scripted signal fetch.
#[derive(Debug, Clone)]
pub enum SignalReply {
    Signal(MarketSignal),
    TransportError(String),
}

/// Plays back signal replies in order; once exhausted, repeats `fallback`.
#[derive(Debug)]
pub struct ScriptedSignals {
    replies: Mutex<VecDeque<SignalReply>>,
    fallback: SignalReply,
    calls: AtomicUsize,
}

impl ScriptedSignals {
    pub fn new(replies: Vec<SignalReply>, fallback: SignalReply) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns the same signal.
    pub fn fixed(signal: MarketSignal) -> Self {
        Self::new(Vec::new(), SignalReply::Signal(signal))
    }

    /// Always fails with a transport error.
    pub fn failing(message: &str) -> Self {
        Self::new(Vec::new(), SignalReply::TransportError(message.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for ScriptedSignals {
    async fn fetch(&self) -> Result<MarketSignal, SignalFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            SignalReply::Signal(s) => Ok(s),
            SignalReply::TransportError(msg) => Err(SignalFetchError::Transport(msg)),
        }
    }
}

/// One scripted oracle reply.
#[derive(Debug, Clone)]
pub enum AdvisorReply {
    Advice(Advice),
    /// Raw oracle text, run through the real response parser.
    Raw(String),
    Timeout,
    /// Wait until cancelled.
    Hang,
}

impl AdvisorReply {
    pub fn decision(decision: Decision, text: Option<&str>) -> Self {
        AdvisorReply::Advice(Advice {
            decision,
            text: text.map(str::to_string),
        })
    }
}

/// Plays back advisor replies in order; once exhausted, repeats `fallback`.
#[derive(Debug)]
pub struct ScriptedAdvisor {
    replies: Mutex<VecDeque<AdvisorReply>>,
    fallback: AdvisorReply,
    calls: AtomicUsize,
}

impl ScriptedAdvisor {
    pub fn new(replies: Vec<AdvisorReply>, fallback: AdvisorReply) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(decision: Decision, text: Option<&str>) -> Self {
        Self::new(Vec::new(), AdvisorReply::decision(decision, text))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Advisor for ScriptedAdvisor {
    async fn decide(
        &self,
        _snapshot: &PositionSnapshot,
        _signal: &MarketSignal,
        cancel: &CancellationToken,
    ) -> Result<Advice, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            AdvisorReply::Advice(advice) => Ok(advice),
            AdvisorReply::Raw(raw) => crate::parser::parse_advice(&raw),
            AdvisorReply::Timeout => Err(AdvisoryError::Timeout(60)),
            AdvisorReply::Hang => {
                cancel.cancelled().await;
                Err(AdvisoryError::Cancelled)
            }
        }
    }
}
