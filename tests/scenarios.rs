//! End-to-end scenarios exercising the full pipeline against the scoring
//! rules and ring-assembly algorithm together, rather than one extractor
//! at a time.

use chrono::{Duration, TimeZone, Utc};
use mule_ring_detector::{run_pipeline, PatternType, PipelineConfig, RiskLevel, Transaction};

fn tx(sender: &str, receiver: &str, amount: f64, hour: i64) -> Transaction {
    Transaction {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        amount,
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
    }
}

#[test]
fn trivial_cycle_nets_to_zero_and_flags_nobody() {
    let config = PipelineConfig::default();
    let transactions = vec![
        tx("A", "B", 500.0, 0),
        tx("B", "C", 500.0, 1),
        tx("C", "A", 500.0, 2),
    ];
    let bundle = run_pipeline(&transactions, &config).unwrap();
    assert!(bundle.suspicious_accounts.is_empty());
    assert!(bundle.fraud_rings.is_empty());
}

#[test]
fn two_high_value_cycles_sharing_a_member_form_one_validated_ring() {
    let config = PipelineConfig::default();
    let transactions = vec![
        tx("A", "B", 5000.0, 0),
        tx("B", "C", 5000.0, 1),
        tx("C", "A", 5000.0, 2),
        tx("A", "D", 5000.0, 3),
        tx("D", "E", 5000.0, 4),
        tx("E", "A", 5000.0, 5),
    ];
    let bundle = run_pipeline(&transactions, &config).unwrap();

    assert_eq!(bundle.suspicious_accounts.len(), 5);
    for account in &bundle.suspicious_accounts {
        // Every member carries at least one validated-cycle signal (+40),
        // clearing the Medium threshold outright; supporting signals may
        // push individual members higher still.
        assert_ne!(account.risk_level, RiskLevel::Low);
        assert!(account.detected_patterns.contains(&"cycle".to_string()));
        assert_eq!(account.ring_id.as_deref(), Some("RING_001"));
    }

    assert_eq!(bundle.fraud_rings.len(), 1);
    let ring = &bundle.fraud_rings[0];
    assert_eq!(ring.ring_id, "RING_001");
    assert_eq!(ring.pattern_type, PatternType::Cycle);
    assert_eq!(ring.member_accounts.len(), 5);
}

#[test]
fn collector_mule_trips_fan_in_smurfing_and_velocity() {
    let config = PipelineConfig::default();
    // M forwards onward to two accounts rather than one, so the fan-in
    // signal is isolated from the "likely merchant" suppression (which
    // keys off out_degree <= 1 and would otherwise cancel it out).
    let mut transactions: Vec<Transaction> =
        (0..15).map(|i| tx(&format!("S{i}"), "M", 100.0, i)).collect();
    transactions.push(tx("M", "OUT1", 750.0, 20));
    transactions.push(tx("M", "OUT2", 750.0, 20));

    let bundle = run_pipeline(&transactions, &config).unwrap();

    let mule = bundle
        .suspicious_accounts
        .iter()
        .find(|a| a.account_id == "M")
        .expect("collector mule should be flagged");
    assert!(mule.suspicion_score >= 70.0);
    assert!(matches!(mule.risk_level, RiskLevel::High | RiskLevel::Critical));
    assert!(mule.detected_patterns.contains(&"fan_in".to_string()));
    assert!(mule.detected_patterns.contains(&"smurfing".to_string()));
    assert!(mule.detected_patterns.contains(&"velocity".to_string()));
}

#[test]
fn payroll_account_is_suppressed_below_the_flag_threshold() {
    let config = PipelineConfig::default();
    let mut transactions: Vec<Transaction> =
        (0..30).map(|i| tx("P", &format!("R{i}"), 100.0, i)).collect();
    transactions.push(tx("SRC", "P", 5000.0, 0));

    let bundle = run_pipeline(&transactions, &config).unwrap();
    assert!(!bundle.suspicious_accounts.iter().any(|a| a.account_id == "P"));
}

#[test]
fn shell_chain_middle_accounts_are_flagged_medium() {
    let config = PipelineConfig::default();
    let transactions = vec![
        tx("A", "B", 10000.0, 0),
        tx("B", "C", 10000.0, 1),
        tx("C", "D", 10000.0, 2),
        tx("D", "E", 10000.0, 3),
    ];
    let bundle = run_pipeline(&transactions, &config).unwrap();

    for id in ["B", "C", "D"] {
        let account = bundle
            .suspicious_accounts
            .iter()
            .find(|a| a.account_id == id)
            .unwrap_or_else(|| panic!("{id} should be flagged"));
        assert!(account.detected_patterns.contains(&"shell".to_string()));
        assert_eq!(account.risk_level, RiskLevel::Medium);
    }
    for id in ["A", "E"] {
        assert!(!bundle.suspicious_accounts.iter().any(|a| a.account_id == id));
    }
}

#[test]
fn high_degree_hub_with_no_cycle_membership_is_not_flagged() {
    let config = PipelineConfig::default();
    let mut transactions = Vec::new();
    for i in 0..80 {
        transactions.push(tx(&format!("IN{i}"), "G", 100.0, i % 48));
        transactions.push(tx("G", &format!("OUT{i}"), 100.0, i % 48));
    }

    let bundle = run_pipeline(&transactions, &config).unwrap();
    assert!(!bundle.suspicious_accounts.iter().any(|a| a.account_id == "G"));
}

#[test]
fn pipeline_rejects_empty_batches() {
    let config = PipelineConfig::default();
    assert!(run_pipeline(&[], &config).is_err());
}
