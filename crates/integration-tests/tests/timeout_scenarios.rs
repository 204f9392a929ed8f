//! Timeout manager under concurrent load

use std::sync::Arc;
use std::time::Duration;

use autocoder_core::application::TimeoutManager;
use autocoder_core::config::TimeoutConfig;
use autocoder_core::domain::{OperationSpec, TimeoutType};
use autocoder_core::port::UuidProvider;
use autocoder_core::AppError;
use futures::future::join_all;

fn manager(config: TimeoutConfig) -> Arc<TimeoutManager> {
    Arc::new(TimeoutManager::new(config, Arc::new(UuidProvider)))
}

/// Mixed batch: half finish inside the limit, half overrun it
#[tokio::test(start_paused = true)]
async fn test_concurrent_operations_split_by_deadline() {
    let timeouts = manager(TimeoutConfig::new().with_limit(TimeoutType::HealthCheck, Duration::from_secs(2)));

    let runs = (0..10u64).map(|i| {
        let timeouts = Arc::clone(&timeouts);
        async move {
            let spec = OperationSpec::new(
                timeouts.generate_operation_id("health"),
                TimeoutType::HealthCheck,
            )
            .component(format!("svc-{}", i));
            // even: 1s, odd: 4s
            let work = Duration::from_secs(if i % 2 == 0 { 1 } else { 4 });
            timeouts
                .run_with_timeout(spec, async move {
                    tokio::time::sleep(work).await;
                    Ok::<_, AppError>(i)
                })
                .await
        }
    });

    let results = join_all(runs).await;

    for (i, result) in results.iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(*result.as_ref().unwrap(), i as u64);
        } else {
            let err = result.as_ref().unwrap_err();
            let timeout = err.as_timeout().unwrap();
            assert_eq!(timeout.timeout_type, TimeoutType::HealthCheck);
            assert_eq!(timeout.component_name.as_deref(), Some(format!("svc-{}", i).as_str()));
        }
    }

    let stats = timeouts.statistics();
    assert_eq!(stats.started, 10);
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.timed_out, 5);
    assert_eq!(stats.active, 0);
    assert!((stats.timeout_rate - 0.5).abs() < f64::EPSILON);
    assert!(timeouts.active_operations().is_empty());
}

/// Infinite-limit work is never cut short while others time out around it
#[tokio::test(start_paused = true)]
async fn test_infinite_limit_outlives_finite_neighbours() {
    let timeouts = manager(TimeoutConfig::new());

    let long = {
        let timeouts = Arc::clone(&timeouts);
        async move {
            let spec = OperationSpec::new("llm-1", TimeoutType::LlmGeneration);
            timeouts
                .run_with_timeout(spec, async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<_, AppError>("done")
                })
                .await
        }
    };
    let short = {
        let timeouts = Arc::clone(&timeouts);
        async move {
            let spec = OperationSpec::new("net-1", TimeoutType::NetworkRequest);
            timeouts
                .run_with_timeout(spec, async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, AppError>("late")
                })
                .await
        }
    };

    let (long, short) = tokio::join!(long, short);
    assert_eq!(long.unwrap(), "done");
    let err = short.unwrap_err();
    let timeout = err.as_timeout().unwrap();
    assert_eq!(timeout.operation_id, "net-1");
    assert!(timeout.elapsed >= Duration::from_secs(30));
    assert!(timeout.elapsed < Duration::from_secs(31));
}

/// The background sweeper clears scopes that were never finished
#[tokio::test(start_paused = true)]
async fn test_sweeper_reaps_abandoned_scopes() {
    let timeouts = manager(TimeoutConfig::new().with_limit(TimeoutType::Validation, Duration::from_secs(1)));
    let sweeper = Arc::clone(&timeouts).spawn_sweeper(Duration::from_secs(5));

    for i in 0..3 {
        let context = timeouts
            .create_context(OperationSpec::new(format!("val-{}", i), TimeoutType::Validation))
            .unwrap();
        assert_eq!(context.operation_id, format!("val-{}", i));
    }
    assert_eq!(timeouts.active_operations().len(), 3);

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(timeouts.active_operations().is_empty());
    assert_eq!(timeouts.statistics().timed_out, 3);
    sweeper.abort();
}
