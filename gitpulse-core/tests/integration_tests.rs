//! Integration tests for gitpulse-core infrastructure

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use gitpulse_core::{
    clone_error, config_error, init_logging, process_concurrently, protocol_error,
    with_timeout, ErrorContext, LogFormat, LoggingConfig, PulseConfig, PulseError,
};

#[tokio::test]
async fn test_error_handling() {
    let error = clone_error!("failed to clone acme/ghost", "test_component");

    match &error {
        PulseError::Clone {
            message, context, ..
        } => {
            assert_eq!(message, "failed to clone acme/ghost");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Clone error"),
    }
    assert!(error.to_string().contains("clone"));

    // Should not panic without a subscriber
    error.log();

    let transport = protocol_error!("connection reset", "test");
    assert!(transport.is_recoverable());

    let config = config_error!("Invalid config", "test");
    assert!(!config.is_recoverable());
}

#[tokio::test]
async fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        include_location: false,
        include_thread: false,
        log_file_path: None,
        enable_performance_monitoring: false,
        filter_directives: vec!["gitpulse_core=debug".to_string()],
    };

    // A global subscriber can only be installed once per process, so only
    // the second call is guaranteed to fail.
    let _ = init_logging(&config);
    assert!(init_logging(&config).is_err());
}

#[tokio::test]
async fn test_timeout_mechanism() {
    let quick_operation = async {
        sleep(Duration::from_millis(10)).await;
        "Success"
    };

    let result = with_timeout(quick_operation, 500, "quick_test").await;
    assert_eq!(tokio_test::assert_ok!(result), "Success");

    let slow_operation = async {
        sleep(Duration::from_millis(500)).await;
        "Should not reach here"
    };

    match with_timeout(slow_operation, 50, "slow_test").await.unwrap_err() {
        PulseError::Timeout {
            operation,
            duration_ms,
            ..
        } => {
            assert_eq!(operation, "slow_test");
            assert_eq!(duration_ms, 50);
        }
        other => panic!("Expected Timeout error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_config_validation() {
    let mut config = PulseConfig::default();
    tokio_test::assert_ok!(config.validate());

    config.metrics.commit_page_size = 500;
    match config.validate().unwrap_err() {
        PulseError::Config { message, .. } => {
            assert!(message.contains("commit_page_size"));
        }
        _ => panic!("Expected Config error"),
    }
}

#[tokio::test]
async fn test_concurrent_processing_pairs_items_with_results() {
    let items: Vec<i32> = (1..=10).collect();

    let results = process_concurrently(items, 3, |item: i32| async move {
        sleep(Duration::from_millis(5 * (10 - item as u64))).await;
        item * 2
    })
    .await;

    assert_eq!(results.len(), 10);
    let mut seen = HashSet::new();
    for (item, result) in results {
        assert_eq!(result.unwrap(), item * 2);
        assert!(seen.insert(item));
    }
}

#[tokio::test]
async fn test_concurrent_processing_bounds_parallelism() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let processor = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        move |_item: usize| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    };

    let results = process_concurrently((0..9).collect(), 3, processor).await;

    assert_eq!(results.len(), 9);
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_concurrent_processing_contains_panics() {
    let results = process_concurrently(vec![1, 2, 3], 2, |item: i32| async move {
        if item == 2 {
            panic!("boom");
        }
        item
    })
    .await;

    assert_eq!(results.len(), 3);
    for (item, result) in results {
        if item == 2 {
            assert!(matches!(result, Err(PulseError::Internal { .. })));
        } else {
            assert_eq!(result.unwrap(), item);
        }
    }
}

#[test]
fn test_error_context_builder() {
    let context = ErrorContext::new("workspace")
        .with_operation("acquire")
        .with_metadata("path", "/tmp/gitpulse/ws-1")
        .with_suggestion("Check disk space");

    assert_eq!(context.operation.as_deref(), Some("acquire"));
    assert_eq!(context.metadata.get("path").map(String::as_str), Some("/tmp/gitpulse/ws-1"));
    assert_eq!(context.recovery_suggestions.len(), 1);
}

#[tokio::test]
async fn test_stage_timing_returns_inner_value() {
    use gitpulse_core::performance::{measure_async, Stopwatch};

    let value = measure_async("scan_code", async {
        sleep(Duration::from_millis(5)).await;
        42
    })
    .await;
    assert_eq!(value, 42);

    let watch = Stopwatch::start("batch");
    sleep(Duration::from_millis(5)).await;
    assert!(watch.finish() >= Duration::from_millis(5));
}

#[test]
fn test_operation_macros_accept_optional_fields() {
    let repository = "acme/widgets";
    let error = clone_error!("boom", "test");

    gitpulse_core::log_operation_start!("analyze_repository");
    gitpulse_core::log_operation_start!("analyze_repository", repository = %repository);
    gitpulse_core::log_operation_success!("analyze_repository", lines = 12u64);
    gitpulse_core::log_operation_error!("analyze_repository", error);
    gitpulse_core::log_operation_error!("analyze_repository", error, repository = %repository);
}
