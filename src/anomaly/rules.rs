//! Rule-based record anomalies
//!
//! Deterministic thresholds over raw record fields, evaluated independently of
//! the statistical detectors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Anomaly, AnomalyType, Severity};
use crate::records::Record;

/// Types of record rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Balance above `high_balance`
    HighBalance,
    /// Transaction count above `high_transactions`
    HighActivity,
    /// Many transactions packed into a short active window
    BurstActivity,
}

/// Rule thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub high_balance: f64,
    pub high_transactions: f64,
    /// Transaction count above which a short active span is suspicious
    pub burst_transactions: f64,
    /// Active span (days) below which a burst is reported
    pub burst_window_days: f64,
    /// List of enabled rules
    pub enabled_rules: Vec<RuleType>,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            high_balance: 1000.0,
            high_transactions: 10_000.0,
            burst_transactions: 100.0,
            burst_window_days: 1.0,
            enabled_rules: vec![RuleType::HighBalance, RuleType::HighActivity, RuleType::BurstActivity],
        }
    }
}

impl RuleThresholds {
    fn is_enabled(&self, rule: RuleType) -> bool {
        self.enabled_rules.contains(&rule)
    }
}

/// Evaluate every enabled rule against every record.
///
/// A record can trigger several rules; each produces its own anomaly.
pub fn pattern_anomalies(records: &[Record], thresholds: &RuleThresholds) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for (i, record) in records.iter().enumerate() {
        // Rule 1: unusually large balance
        if thresholds.is_enabled(RuleType::HighBalance) {
            if let Some(balance) = record.balance.filter(|b| *b > thresholds.high_balance) {
                anomalies.push(
                    Anomaly::new(
                        format!("rule_balance_{}", i),
                        record.address.clone(),
                        AnomalyType::UnusualBalance,
                        Severity::High,
                        balance / thresholds.high_balance,
                        format!("HIGH_BALANCE: {:.4} exceeds {}", balance, thresholds.high_balance),
                    )
                    .with_feature("balance", balance),
                );
            }
        }

        // Rule 2: unusually many transactions
        if thresholds.is_enabled(RuleType::HighActivity) {
            if let Some(tx) = record.transactions.filter(|t| *t > thresholds.high_transactions) {
                anomalies.push(
                    Anomaly::new(
                        format!("rule_activity_{}", i),
                        record.address.clone(),
                        AnomalyType::UnusualActivity,
                        Severity::High,
                        tx / thresholds.high_transactions,
                        format!("HIGH_ACTIVITY: {} transactions exceeds {}", tx, thresholds.high_transactions),
                    )
                    .with_feature("transactions", tx),
                );
            }
        }

        // Rule 3: burst of transactions inside a short window
        if thresholds.is_enabled(RuleType::BurstActivity) {
            let burst = record
                .transactions
                .filter(|t| *t > thresholds.burst_transactions)
                .zip(record.active_span_days())
                .filter(|(_, span)| *span >= 0.0 && *span < thresholds.burst_window_days);
            if let Some((tx, span)) = burst {
                anomalies.push(
                    Anomaly::new(
                        format!("rule_timing_{}", i),
                        record.address.clone(),
                        AnomalyType::UnusualTiming,
                        Severity::Medium,
                        tx / thresholds.burst_transactions,
                        format!("BURST: {} transactions within {:.2} days", tx, span),
                    )
                    .with_feature("transactions", tx)
                    .with_feature("span_days", span),
                );
            }
        }
    }

    debug!(records = records.len(), triggered = anomalies.len(), "evaluated record rules");
    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_empty_records() {
        assert!(pattern_anomalies(&[], &RuleThresholds::default()).is_empty());
    }

    #[test]
    fn test_high_balance_and_activity() {
        let records = vec![
            Record::new("whale").with_balance(1500.0),
            Record::new("busy").with_transactions(20_000.0),
            Record::new("normal").with_balance(1000.0).with_transactions(10_000.0),
        ];
        let anomalies = pattern_anomalies(&records, &RuleThresholds::default());
        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].address, "whale");
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::UnusualBalance);
        assert_eq!(anomalies[0].severity, Severity::High);
        assert_eq!(anomalies[1].address, "busy");
        assert_eq!(anomalies[1].anomaly_type, AnomalyType::UnusualActivity);
    }

    #[test]
    fn test_burst_timing() {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let burst = Record::new("burst")
            .with_transactions(150.0)
            .with_first_seen(start)
            .with_last_seen(start + Duration::hours(6));
        let slow = Record::new("slow")
            .with_transactions(150.0)
            .with_first_seen(start)
            .with_last_seen(start + Duration::days(3));
        let undated = Record::new("undated").with_transactions(150.0);

        let anomalies = pattern_anomalies(&[burst, slow, undated], &RuleThresholds::default());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].address, "burst");
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::UnusualTiming);
        assert_eq!(anomalies[0].severity, Severity::Medium);
        assert_eq!(anomalies[0].features.get("span_days"), Some(&0.25));
    }

    #[test]
    fn test_burst_ignores_reversed_span() {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let reversed = Record::new("reversed")
            .with_transactions(150.0)
            .with_first_seen(start)
            .with_last_seen(start - Duration::days(30));
        let instant = Record::new("instant")
            .with_transactions(150.0)
            .with_first_seen(start)
            .with_last_seen(start);

        let anomalies = pattern_anomalies(&[reversed, instant], &RuleThresholds::default());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].address, "instant");
        assert_eq!(anomalies[0].features.get("span_days"), Some(&0.0));
    }

    #[test]
    fn test_one_record_can_trigger_several_rules() {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let record = Record::new("everything")
            .with_balance(5000.0)
            .with_transactions(50_000.0)
            .with_first_seen(start)
            .with_last_seen(start + Duration::hours(1));
        let anomalies = pattern_anomalies(&[record], &RuleThresholds::default());
        assert_eq!(anomalies.len(), 3);
    }

    #[test]
    fn test_disabled_rules_skipped() {
        let thresholds = RuleThresholds {
            enabled_rules: vec![RuleType::HighActivity],
            ..RuleThresholds::default()
        };
        let records = vec![Record::new("whale").with_balance(1500.0)];
        assert!(pattern_anomalies(&records, &thresholds).is_empty());
    }
}
