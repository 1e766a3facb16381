use crate::error::FailureKind;

const INSUFFICIENT_FUNDS: &[&str] = &["insufficient funds", "insufficient_funds"];
const UNDERPRICED: &[&str] = &[
    "underpriced",
    "max fee per gas less than block base fee",
    "fee cap less than block base fee",
    "replacement_underpriced",
];
const NONCE: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "invalid nonce",
    "nonce_expired",
    "already known",
];
const GAS_ESTIMATION: &[&str] = &[
    "gas required exceeds allowance",
    "cannot estimate gas",
    "failed to estimate gas",
    "unpredictable_gas_limit",
    "intrinsic gas too low",
];
const TIMEOUT: &[&str] = &["timed out", "timeout"];

/// Map a raw node/provider error message onto the failure taxonomy.
pub fn classify_error(message: &str) -> FailureKind {
    let lower = message.to_ascii_lowercase();
    let matches = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if matches(INSUFFICIENT_FUNDS) {
        FailureKind::InsufficientFunds
    } else if matches(UNDERPRICED) {
        FailureKind::Underpriced
    } else if matches(NONCE) {
        FailureKind::NonceConflict
    } else if let Some(pos) = lower.find("execution reverted") {
        let rest = &message[pos + "execution reverted".len()..];
        let reason = rest.trim_start_matches([':', ' ']).trim();
        FailureKind::Reverted(if reason.is_empty() {
            "execution reverted".to_string()
        } else {
            reason.to_string()
        })
    } else if matches(GAS_ESTIMATION) {
        FailureKind::GasEstimationFailed
    } else if matches(TIMEOUT) {
        FailureKind::Timeout
    } else {
        FailureKind::Unknown(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds() {
        assert_eq!(
            classify_error("server returned an error response: error code -32000: insufficient funds for gas * price + value"),
            FailureKind::InsufficientFunds
        );
        assert_eq!(classify_error("INSUFFICIENT_FUNDS"), FailureKind::InsufficientFunds);
    }

    #[test]
    fn nonce_conflicts() {
        assert_eq!(classify_error("nonce too low: next nonce 12, tx nonce 11"), FailureKind::NonceConflict);
        assert_eq!(classify_error("NONCE_EXPIRED"), FailureKind::NonceConflict);
        assert_eq!(classify_error("already known"), FailureKind::NonceConflict);
    }

    #[test]
    fn underpriced_wins_over_nonce_wording() {
        assert_eq!(
            classify_error("replacement transaction underpriced"),
            FailureKind::Underpriced
        );
        assert_eq!(
            classify_error("max fee per gas less than block base fee: address 0x.., maxFeePerGas: 10"),
            FailureKind::Underpriced
        );
    }

    #[test]
    fn reverted_keeps_reason() {
        assert_eq!(
            classify_error("server returned an error response: error code 3: execution reverted: STF"),
            FailureKind::Reverted("STF".to_string())
        );
        assert_eq!(
            classify_error("execution reverted"),
            FailureKind::Reverted("execution reverted".to_string())
        );
    }

    #[test]
    fn gas_estimation() {
        assert_eq!(
            classify_error("gas required exceeds allowance (30000000)"),
            FailureKind::GasEstimationFailed
        );
        assert_eq!(classify_error("UNPREDICTABLE_GAS_LIMIT"), FailureKind::GasEstimationFailed);
    }

    #[test]
    fn timeout_and_unknown() {
        assert_eq!(classify_error("request timed out"), FailureKind::Timeout);
        assert_eq!(
            classify_error("connection refused"),
            FailureKind::Unknown("connection refused".to_string())
        );
    }
}
