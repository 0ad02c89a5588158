//! End-to-end checks for the analysis pipeline and its stages

use chain_patterns::anomaly::{isolation_scores, IsolationForestParams, StatisticalParams};
use chain_patterns::clustering::{DbscanParams, KMeansParams, NoiseHandling};
use chain_patterns::config::PatternRecognitionConfig;
use chain_patterns::features::extract_features;
use chain_patterns::*;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn balance_records(balances: &[f64]) -> Vec<Record> {
    balances
        .iter()
        .enumerate()
        .map(|(i, &b)| Record::new(format!("bc1qaddr{:02}", i)).with_balance(b).with_transactions(0.0))
        .collect()
}

fn mixed_records() -> Vec<Record> {
    let base = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
    (0..40)
        .map(|i| {
            let first = base + chrono::Duration::days(i * 9);
            Record::new(format!("1Ab{}xyz{}", i % 3, i))
                .with_balance(((i * 37) % 500) as f64 + 0.5)
                .with_transactions(((i * 11) % 90 + 1) as f64)
                .with_first_seen(first)
                .with_last_seen(first + chrono::Duration::days(30 + i))
        })
        .collect()
}

#[test]
fn analyze_empty_input() {
    let result = analyze_patterns(&[], &PatternRecognitionConfig::default()).unwrap();

    assert!(result.patterns.is_empty());
    assert!(result.clusters.is_empty());
    assert!(result.anomalies.is_empty());
    assert!(result.correlations.is_empty());
    assert!(result.confidence.is_finite());
    assert!(result.processing_time_ms >= 0.0);
}

#[test]
fn zscore_flags_the_single_rich_record() {
    let mut balances = vec![0.0; 11];
    balances.push(1500.0);
    let records = balance_records(&balances);

    let normalized = normalize_features(&extract_features(&records));
    let anomalies = statistical_outliers(&normalized, &StatisticalParams::default());

    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].address, "bc1qaddr11");
    assert_eq!(anomalies[0].anomaly_type, AnomalyType::StatisticalOutlier);
    assert!(anomalies[0].score > 3.0);
}

#[test]
fn kmeans_on_empty_input_is_empty() {
    let mut rng = StdRng::seed_from_u64(0);
    assert!(kmeans_clustering(&[], &KMeansParams::with_k(5), &mut rng).is_empty());
}

#[test]
fn dbscan_small_group_below_min_samples_is_dropped() {
    let vectors = vec![
        FeatureVector::new("a", vec![0.0, 0.0]),
        FeatureVector::new("b", vec![0.1, 0.0]),
        FeatureVector::new("c", vec![0.0, 0.1]),
        FeatureVector::new("d", vec![0.1, 0.1]),
        FeatureVector::new("far", vec![5.0, 5.0]),
    ];

    assert!(dbscan_clustering(&vectors, &DbscanParams::default()).is_empty());

    let collected = dbscan_clustering(
        &vectors,
        &DbscanParams {
            noise_handling: NoiseHandling::CollectSeparately,
            ..DbscanParams::default()
        },
    );
    assert_eq!(collected.len(), 1);
    assert!(collected[0].noise);
    assert_eq!(collected[0].size, 5);
}

#[test]
fn seeded_runs_are_reproducible() {
    let records = mixed_records();
    let config = PatternRecognitionConfig {
        seed: Some(42),
        reference_time: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        ..PatternRecognitionConfig::default()
    };

    let first = analyze_patterns(&records, &config).unwrap();
    let second = analyze_patterns(&records, &config).unwrap();

    let flagged = |r: &PatternRecognitionResult| -> Vec<(String, String)> {
        r.anomalies.iter().map(|a| (a.id.clone(), a.address.clone())).collect()
    };

    assert_eq!(first.clusters, second.clusters);
    assert_eq!(flagged(&first), flagged(&second));
    assert_eq!(first.patterns, second.patterns);
    assert_eq!(first.correlations, second.correlations);
}

#[test]
fn cluster_ages_are_measured_against_reference_time() {
    let reference = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let records: Vec<Record> = (0..6)
        .map(|i| Record::new(format!("bc1q{}", i)).with_first_seen(reference - chrono::Duration::days(100)))
        .collect();
    let config = PatternRecognitionConfig {
        seed: Some(1),
        reference_time: Some(reference),
        ..PatternRecognitionConfig::default()
    };

    let clusters = PatternAnalyzer::new(config).unwrap().cluster_records(&records).unwrap();
    assert!(!clusters.is_empty());
    for cluster in &clusters {
        assert_eq!(cluster.features.avg_age_days, 100.0);
    }
}

#[test]
fn seeded_isolation_scores_match() {
    let records = mixed_records();
    let vectors = normalize_features(&extract_features(&records));
    let params = IsolationForestParams::default();

    let a = isolation_scores(&vectors, &params, &mut StdRng::seed_from_u64(9));
    let b = isolation_scores(&vectors, &params, &mut StdRng::seed_from_u64(9));

    assert_eq!(a.len(), records.len());
    assert_eq!(a, b);
    assert!(a.iter().all(|s| *s > 0.0 && *s <= 1.0));
}

#[test]
fn every_record_lands_in_one_cluster() {
    let records = mixed_records();
    for algorithm in [ClusterAlgorithm::KMeans, ClusterAlgorithm::Hierarchical] {
        let config = PatternRecognitionConfig {
            cluster_algorithm: algorithm,
            seed: Some(5),
            ..PatternRecognitionConfig::default()
        };
        let clusters = PatternAnalyzer::new(config).unwrap().cluster_records(&records).unwrap();

        let mut members: Vec<String> = clusters.iter().flat_map(|c| c.members.clone()).collect();
        members.sort();
        let mut expected: Vec<String> = records.iter().map(|r| r.address.clone()).collect();
        expected.sort();
        assert_eq!(members, expected, "{:?}", algorithm);
        assert!(clusters.len() <= 5);
    }
}

#[test]
fn rule_anomalies_are_appended_to_detector_output() {
    let mut records = mixed_records();
    records.push(Record::new("whale").with_balance(25_000.0));

    let config = PatternRecognitionConfig {
        anomaly_algorithm: AnomalyAlgorithm::Lof,
        seed: Some(1),
        ..PatternRecognitionConfig::default()
    };
    let anomalies = PatternAnalyzer::new(config).unwrap().detect_records(&records).unwrap();

    let whale: Vec<&Anomaly> = anomalies
        .iter()
        .filter(|a| a.anomaly_type == AnomalyType::UnusualBalance)
        .collect();
    assert_eq!(whale.len(), 1);
    assert_eq!(whale[0].address, "whale");
    assert!(anomalies.iter().all(|a| a.score.is_finite()));
}

#[test]
fn correlations_need_enough_samples() {
    let records = mixed_records();
    let config = PatternRecognitionConfig {
        seed: Some(2),
        ..PatternRecognitionConfig::default()
    };
    let result = analyze_patterns(&records, &config).unwrap();

    assert_eq!(result.correlations.len(), 1);
    let c = &result.correlations[0];
    assert_eq!(c.dataset1, "balance");
    assert_eq!(c.dataset2, "transactions");
    assert_eq!(c.sample_size, records.len());
    assert!((-1.0..=1.0).contains(&c.coefficient));
    assert!((0.0..=1.0).contains(&c.p_value));

    let few = &records[..5];
    assert!(analyze_patterns(few, &config).unwrap().correlations.is_empty());
}

#[test]
fn pattern_addresses_come_from_input() {
    let records = mixed_records();
    let patterns = discover_patterns(&records, &Default::default());
    assert!(!patterns.is_empty());
    for pattern in &patterns {
        assert_eq!(pattern.frequency, pattern.addresses.len());
        for address in &pattern.addresses {
            assert!(records.iter().any(|r| &r.address == address));
        }
    }
}

#[test]
fn result_serializes_with_type_tags() {
    let records = balance_records(&[2000.0; 12]);
    let config = PatternRecognitionConfig {
        seed: Some(3),
        ..PatternRecognitionConfig::default()
    };
    let result = analyze_patterns(&records, &config).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert!(json["patterns"].as_array().unwrap().iter().any(|p| p["type"] == "balance_pattern"));
    assert!(json["anomalies"].as_array().unwrap().iter().any(|a| a["type"] == "unusual_balance"));
}
