//! End-to-end generation runs through the production wiring
//!
//! Real component files, real ledger file, real bind tests.

use std::collections::HashSet;
use std::path::Path;

use autocoder_core::config::PortConfig;
use autocoder_core::domain::{AllocationSource, ResourceType};
use autocoder_core::port::LedgerBackend;
use autocoder_infra_system::FileLedger;
use autocoder_runtime::{GenerationContext, Settings};
use tempfile::TempDir;

fn settings(ledger_path: &Path, start: u16, end: u16) -> Settings {
    let mut settings = Settings {
        ports: PortConfig::with_range(start, end, []),
        ..Settings::default()
    };
    settings.ledger.path = Some(ledger_path.display().to_string());
    settings
}

fn write_components(dir: &Path) {
    std::fs::write(
        dir.join("api.json"),
        r#"[{"name": "gateway", "type": "APIEndpoint"},
            {"name": "live", "type": "WebSocket"}]"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("orders.json"),
        r#"{"name": "orders", "type": "Store", "dependencies": ["asyncpg==0.29"]}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("pipeline.json"),
        r#"[{"name": "enrich", "type": "Transformer", "source": "from kafka import KafkaProducer"},
            {"name": "totals", "type": "Accumulator", "dependencies": ["redis"]},
            {"name": "ingest", "type": "Source"}]"#,
    )
    .unwrap();
}

#[tokio::test]
async fn test_full_manifest_from_component_directory() {
    let dir = TempDir::new().unwrap();
    let components = dir.path().join("components");
    std::fs::create_dir(&components).unwrap();
    write_components(&components);
    let ledger_path = dir.path().join("state").join("port_ledger.json");

    let ctx = GenerationContext::from_settings(settings(&ledger_path, 42000, 42199)).unwrap();
    let manifest = ctx.generate_manifest("shop", &components).await.unwrap();

    let ports = manifest.ports();
    assert_eq!(ports.len(), 2);
    assert_eq!(ports.iter().collect::<HashSet<_>>().len(), 2);
    assert!(ports.iter().all(|p| (42000..=42199).contains(p)));

    assert_eq!(
        manifest
            .value_of("orders", ResourceType::DatabaseName)
            .and_then(|v| v.as_name()),
        Some("autocoder_shop_orders_db")
    );
    let connection = manifest
        .value_of("orders", ResourceType::DatabaseConnection)
        .and_then(|v| v.as_name())
        .unwrap();
    assert!(connection.starts_with("postgresql://"));
    assert!(connection.ends_with("/autocoder_shop_orders_db"));

    assert_eq!(
        manifest
            .value_of("enrich", ResourceType::MessageTopic)
            .and_then(|v| v.as_name()),
        Some("shop.enrich.events")
    );
    assert_eq!(
        manifest
            .value_of("totals", ResourceType::CacheKeyPrefix)
            .and_then(|v| v.as_name()),
        Some("autocoder:shop:totals")
    );
    assert_eq!(
        manifest
            .value_of("ingest", ResourceType::StoragePath)
            .and_then(|v| v.as_name()),
        Some("/data/shop/ingest")
    );
    assert!(manifest
        .allocations
        .iter()
        .filter(|a| a.resource_type == ResourceType::Port)
        .all(|a| a.source == AllocationSource::Pool));
    assert_eq!(manifest.metadata["failed"], 0);

    // ledger file written with our pid
    let snapshot = FileLedger::new(&ledger_path).snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot
        .entries()
        .all(|(_, entry)| entry.system == "shop" && entry.pid == std::process::id()));

    let config = ctx.generate_config(&manifest);
    assert_eq!(config.len(), 6);
    assert_eq!(config["orders"]["database_name"], "autocoder_shop_orders_db");
}

#[tokio::test]
async fn test_cleanup_empties_the_ledger_and_frees_names() {
    let dir = TempDir::new().unwrap();
    let components = dir.path().join("components");
    std::fs::create_dir(&components).unwrap();
    write_components(&components);
    let ledger_path = dir.path().join("port_ledger.json");

    let ctx = GenerationContext::from_settings(settings(&ledger_path, 42200, 42399)).unwrap();
    let first = ctx.generate_manifest("shop", &components).await.unwrap();

    let report = ctx.cleanup_system("shop").await.unwrap();
    assert_eq!(report.ports_released, 2);
    assert_eq!(report.ledger_entries_released, 2);
    assert!(report.names_released > 0);
    assert!(FileLedger::new(&ledger_path).snapshot().unwrap().is_empty());

    // names come back without suffixes after cleanup
    let second = ctx.generate_manifest("shop", &components).await.unwrap();
    assert_eq!(
        second.value_of("orders", ResourceType::DatabaseName),
        first.value_of("orders", ResourceType::DatabaseName)
    );
}

#[tokio::test]
async fn test_two_systems_share_one_ledger() {
    let dir = TempDir::new().unwrap();
    let components = dir.path().join("components");
    std::fs::create_dir(&components).unwrap();
    write_components(&components);
    let ledger_path = dir.path().join("port_ledger.json");

    let shop = GenerationContext::from_settings(settings(&ledger_path, 42400, 42599)).unwrap();
    let blog = GenerationContext::from_settings(settings(&ledger_path, 42400, 42599)).unwrap();

    let a = shop.generate_manifest("shop", &components).await.unwrap();
    let b = blog.generate_manifest("blog", &components).await.unwrap();

    let a_ports: HashSet<u16> = a.ports().into_iter().collect();
    let b_ports: HashSet<u16> = b.ports().into_iter().collect();
    assert!(a_ports.is_disjoint(&b_ports));
    assert_eq!(FileLedger::new(&ledger_path).snapshot().unwrap().len(), 4);
}

#[tokio::test]
async fn test_one_context_serves_two_systems_with_same_components() {
    let dir = TempDir::new().unwrap();
    let components = dir.path().join("components");
    std::fs::create_dir(&components).unwrap();
    write_components(&components);
    let ledger_path = dir.path().join("port_ledger.json");

    let ctx = GenerationContext::from_settings(settings(&ledger_path, 42700, 42899)).unwrap();
    let shop = ctx.generate_manifest("shop", &components).await.unwrap();
    let blog = ctx.generate_manifest("blog", &components).await.unwrap();

    assert_eq!(shop.metadata["failed"], 0);
    assert_eq!(blog.metadata["failed"], 0);
    let shop_ports: HashSet<u16> = shop.ports().into_iter().collect();
    let blog_ports: HashSet<u16> = blog.ports().into_iter().collect();
    assert_eq!(shop_ports.len(), 2);
    assert_eq!(blog_ports.len(), 2);
    assert!(shop_ports.is_disjoint(&blog_ports));
    assert_ne!(
        ctx.registry().component_port("shop", "gateway"),
        ctx.registry().component_port("blog", "gateway")
    );

    ctx.cleanup_system("shop").await.unwrap();
    let snapshot = FileLedger::new(&ledger_path).snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.entries().all(|(_, entry)| entry.system == "blog"));
    assert!(ctx.registry().component_port("blog", "gateway").is_some());
}

#[tokio::test]
async fn test_missing_component_directory_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("port_ledger.json");
    let ctx = GenerationContext::from_settings(settings(&ledger_path, 42600, 42699)).unwrap();

    let err = ctx
        .generate_manifest("shop", &dir.path().join("missing"))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to scan components"));
    assert!(ctx.registry().allocations_for_system("shop").is_empty());
}
