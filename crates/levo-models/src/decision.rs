use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// The three actions the decision oracle may choose from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Leverage,
    Deleverage,
    Hold,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Leverage, ActionKind::Deleverage, ActionKind::Hold];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Leverage => "leverage",
            ActionKind::Deleverage => "deleverage",
            ActionKind::Hold => "hold",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leverage" => Ok(ActionKind::Leverage),
            "deleverage" => Ok(ActionKind::Deleverage),
            "hold" => Ok(ActionKind::Hold),
            other => Err(format!("unrecognized action: {other:?}")),
        }
    }
}

/// A validated rebalancing decision. Amounts are in the smallest unit of the
/// asset the bundle spends; `Hold` carries no amount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Leverage { amount: U256 },
    Deleverage { amount: U256 },
    Hold,
}

impl Decision {
    /// Build a decision, enforcing `amount == 0` iff the action is `Hold`.
    /// Returns `None` for a zero-amount leverage/deleverage.
    pub fn new(kind: ActionKind, amount: U256) -> Option<Self> {
        match kind {
            ActionKind::Hold => Some(Decision::Hold),
            _ if amount.is_zero() => None,
            ActionKind::Leverage => Some(Decision::Leverage { amount }),
            ActionKind::Deleverage => Some(Decision::Deleverage { amount }),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Decision::Leverage { .. } => ActionKind::Leverage,
            Decision::Deleverage { .. } => ActionKind::Deleverage,
            Decision::Hold => ActionKind::Hold,
        }
    }

    pub fn amount(&self) -> U256 {
        match self {
            Decision::Leverage { amount } | Decision::Deleverage { amount } => *amount,
            Decision::Hold => U256::ZERO,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Decision::Hold)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Hold => f.write_str("hold"),
            other => write!(f, "{} {}", other.kind(), other.amount()),
        }
    }
}

/// Decision plus any free-form narration the oracle attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advice {
    pub decision: Decision,
    pub text: Option<String>,
}

/// Parse a non-negative integer amount from a JSON value.
///
/// Accepts decimal strings (`"10000"`), `0x`-prefixed hex strings and
/// unsigned JSON integers. Floats, negatives and empty strings are rejected.
pub fn parse_amount(value: &serde_json::Value) -> Option<U256> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                if hex.is_empty() {
                    return None;
                }
                return U256::from_str_radix(hex, 16).ok();
            }
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            U256::from_str_radix(s, 10).ok()
        }
        serde_json::Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}
