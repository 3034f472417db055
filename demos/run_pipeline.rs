//! Pipeline walkthrough example
//!
//! Builds a small synthetic transaction batch containing a validated
//! laundering ring and a collector-mule pattern, runs the detection
//! pipeline, and prints the resulting suspicious accounts and fraud rings.

use chrono::{Duration, TimeZone, Utc};
use mule_ring_detector::{run_pipeline, PipelineConfig, Transaction};

fn tx(sender: &str, receiver: &str, amount: f64, hour: i64) -> Transaction {
    Transaction {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        amount,
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
    }
}

fn main() {
    println!("=== Mule Ring Detector ===\n");

    let mut transactions = vec![
        // Two high-value cycles sharing account A: a validated ring.
        tx("A", "B", 5000.0, 0),
        tx("B", "C", 5000.0, 1),
        tx("C", "A", 5000.0, 2),
        tx("A", "D", 5000.0, 3),
        tx("D", "E", 5000.0, 4),
        tx("E", "A", 5000.0, 5),
    ];

    // A collector mule: fifteen senders funneling into M within two days,
    // forwarded onward to two accounts (a single recipient would instead
    // read as a merchant settling into one acquiring account).
    for i in 0..15 {
        transactions.push(tx(&format!("S{i}"), "M", 100.0, i));
    }
    transactions.push(tx("M", "OUT1", 750.0, 20));
    transactions.push(tx("M", "OUT2", 750.0, 20));

    let config = PipelineConfig::default();
    let bundle = run_pipeline(&transactions, &config).expect("pipeline run");

    println!(
        "Analyzed {} accounts, flagged {}, grouped into {} rings ({:.3}s)\n",
        bundle.summary.total_accounts_analyzed,
        bundle.summary.suspicious_accounts_flagged,
        bundle.summary.fraud_rings_detected,
        bundle.summary.processing_time_seconds,
    );

    println!("Suspicious accounts:");
    for account in &bundle.suspicious_accounts {
        println!(
            "  {:<6} score={:<5.1} risk={:?} patterns={:?} ring={:?}",
            account.account_id,
            account.suspicion_score,
            account.risk_level,
            account.detected_patterns,
            account.ring_id,
        );
    }

    println!("\nFraud rings:");
    for ring in &bundle.fraud_rings {
        println!(
            "  {} ({:?}) members={:?} risk_score={} total_amount={}",
            ring.ring_id, ring.pattern_type, ring.member_accounts, ring.risk_score, ring.total_amount,
        );
    }
}
