//! Donation Weighting
//!
//! Scores a donation by amount (log scale) plus a small, capped bonus for
//! attaching a message. Pure functions, so the same donation always scores the same.

use alloy::primitives::utils::format_units;
use alloy::primitives::U256;

/// Added to the amount before taking the log so zero-value donations stay finite
pub const AMOUNT_EPSILON: f64 = 0.000_001;

/// Multiplier applied to the log of the amount
pub const AMOUNT_SCALE: f64 = 10.0;

/// Characters of message per point of bonus
pub const MESSAGE_CHARS_PER_POINT: f64 = 100.0;

/// Upper bound on the message bonus
pub const MAX_MESSAGE_BONUS: f64 = 5.0;

/// Lowest weight a donation can have
pub const MIN_WEIGHT: f64 = 1.0;

/// Compute the weight of a donation
///
/// # Arguments
/// * `value_display` - Donated amount in ether as a decimal string; unparsable input counts as zero
/// * `message` - The attached message, if any
pub fn message_weight(value_display: &str, message: Option<&str>) -> f64 {
    let amount = value_display.trim().parse::<f64>().unwrap_or(0.0).max(0.0);
    let mut weight = (amount + AMOUNT_EPSILON).log10() * AMOUNT_SCALE;

    if let Some(text) = message.map(str::trim).filter(|t| !t.is_empty()) {
        let chars = text.chars().count() as f64;
        weight += (chars / MESSAGE_CHARS_PER_POINT).min(MAX_MESSAGE_BONUS);
    }

    weight.max(MIN_WEIGHT)
}

/// Format a wei amount as ether, without trailing zeros (e.g. `0.001`, `2`, `0`)
pub fn format_ether(wei: U256) -> String {
    match format_units(wei, "ether") {
        Ok(formatted) => trim_fraction(&formatted).to_string(),
        // "ether" is always a valid unit
        Err(_) => format!("{} wei", wei),
    }
}

/// Drop trailing zeros after the decimal point, and the point itself if nothing remains
fn trim_fraction(decimal: &str) -> &str {
    if !decimal.contains('.') {
        return decimal;
    }
    decimal.trim_end_matches('0').trim_end_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(WEI_PER_ETHER)
    }

    // ==================== message_weight tests ====================

    #[test]
    fn test_small_donation_is_floored() {
        // log10(0.001) * 10 is about -30, so the floor applies
        assert_eq!(message_weight("0.001", Some("thanks!")), 1.0);
    }

    #[test]
    fn test_zero_donation_is_floored() {
        assert_eq!(message_weight("0", None), MIN_WEIGHT);
        assert_eq!(message_weight("0", Some("a message with no value")), MIN_WEIGHT);
    }

    #[test]
    fn test_large_donation_scores_log_scale() {
        // log10(100 + 1e-6) * 10 ~= 20
        let weight = message_weight("100", None);
        assert!((weight - 20.0).abs() < 1e-6, "weight was {}", weight);
    }

    #[test]
    fn test_message_bonus_is_length_based() {
        let base = message_weight("100", None);
        let with_message = message_weight("100", Some(&"x".repeat(250)));
        assert!((with_message - base - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_message_bonus_is_capped() {
        let base = message_weight("100", None);
        let with_message = message_weight("100", Some(&"x".repeat(5000)));
        assert!((with_message - base - MAX_MESSAGE_BONUS).abs() < 1e-9);
    }

    #[test]
    fn test_blank_message_earns_no_bonus() {
        assert_eq!(message_weight("100", Some("   ")), message_weight("100", None));
        assert_eq!(message_weight("100", Some("")), message_weight("100", None));
    }

    #[test]
    fn test_bonus_counts_trimmed_characters() {
        assert_eq!(
            message_weight("100", Some("   hello   ")),
            message_weight("100", Some("hello"))
        );
    }

    #[test]
    fn test_weight_is_monotonic_in_amount() {
        let amounts = ["0", "0.000001", "0.001", "0.5", "1", "1.5", "10", "1000", "123456.789"];
        for message in [None, Some("thanks!"), Some("a much longer message with some substance")] {
            let weights: Vec<f64> = amounts.iter().map(|a| message_weight(a, message)).collect();
            for pair in weights.windows(2) {
                assert!(pair[1] >= pair[0], "weights not monotonic: {:?}", weights);
            }
        }
    }

    #[test]
    fn test_weight_never_below_floor() {
        for amount in ["0", "0.0000000001", "0.01", "1", "not a number", ""] {
            assert!(message_weight(amount, None) >= MIN_WEIGHT);
            assert!(message_weight(amount, Some("hi")) >= MIN_WEIGHT);
        }
    }

    #[test]
    fn test_weight_is_deterministic() {
        assert_eq!(
            message_weight("3.25", Some("same input")),
            message_weight("3.25", Some("same input"))
        );
    }

    // ==================== format_ether tests ====================

    #[test]
    fn test_format_ether_fraction() {
        assert_eq!(format_ether(U256::from(1_000_000_000_000_000u64)), "0.001");
    }

    #[test]
    fn test_format_ether_whole() {
        assert_eq!(format_ether(ether(2)), "2");
    }

    #[test]
    fn test_format_ether_zero() {
        assert_eq!(format_ether(U256::ZERO), "0");
    }

    #[test]
    fn test_format_ether_one_wei() {
        assert_eq!(format_ether(U256::from(1u64)), "0.000000000000000001");
    }

    #[test]
    fn test_format_ether_mixed() {
        let wei = ether(1) + U256::from(500_000_000_000_000_000u64);
        assert_eq!(format_ether(wei), "1.5");
    }

    #[test]
    fn test_trim_fraction() {
        assert_eq!(trim_fraction("10.000000"), "10");
        assert_eq!(trim_fraction("0.100"), "0.1");
        assert_eq!(trim_fraction("100"), "100");
    }

    #[test]
    fn test_format_ether_large() {
        let wei = ether(1_000_000) * U256::from(1_000_000u64);
        assert_eq!(format_ether(wei), "1000000000000");
    }
}
