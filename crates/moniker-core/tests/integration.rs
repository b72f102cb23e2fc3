//! # Moniker Service Integration Tests
//!
//! End-to-end coverage of the resolution pipeline and governance lanes.
//!
//! | Concern | Test |
//! |---------|------|
//! | SQL template expansion with a pinned date | `resolve_expands_filter_and_version_date` |
//! | Wildcard + latest sentinel | `resolve_wildcard_and_latest` |
//! | Deprecation redirect via successor | `deprecated_node_redirects_to_successor` |
//! | Breaking reload gate | `blocked_reload_leaves_catalog_untouched` |
//! | Two-token request lifecycle | `submit_and_approve_lifecycle` |
//! | Ownership inheritance rollup | `ownership_rolls_up_field_wise` |
//! | Snapshot atomicity under reload | `concurrent_resolves_never_see_a_mix` |
//! | Cache + telemetry counters | `cache_and_telemetry_counters` |

use std::sync::Arc;
use std::time::Instant;

use moniker_core::{
    Caller, CatalogDefinition, MonikerProposal, MonikerService, NodeStatus, ServiceConfig,
    ServiceError, SourceType, StatusMetadata,
};
use moniker_telemetry::{MemorySink, Operation, Outcome};

const CATALOG: &str = r##"
prices:
  ownership:
    accountable_owner: alice
prices.equity:
  display_name: Equity prices
  ownership:
    support_channel: "#equity-data"
  tags: [prices, equity]
  source_binding:
    type: snowflake
    config:
      account: acme
      database: marketdata
      query: "SELECT s,p FROM E WHERE {filter[0]:symbol} AND trade_date = {version_date}"
    allowed_operations: [READ]
rates.libor/usd:
  status: DEPRECATED
  deprecation_message: LIBOR publication ended
  successor: rates.sofr/usd
  sunset_deadline: 2026-12-31
rates.sofr/usd:
  source_binding:
    type: snowflake
    config:
      account: acme
      query: "SELECT rate FROM SOFR WHERE {filter[0]:ccy}"
"##;

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.auth.submit_token = Some("submit-token".into());
    config.auth.approve_token = Some("approve-token".into());
    config
}

fn service_with_sink() -> (MonikerService, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let definition = CatalogDefinition::from_yaml_str(CATALOG).unwrap();
    let service =
        MonikerService::from_definition(test_config(), definition, sink.clone()).unwrap();
    (service, sink)
}

fn caller() -> Caller {
    Caller::new("integration-tests")
}

// =============================================================================
// RESOLUTION
// =============================================================================

#[tokio::test]
async fn resolve_expands_filter_and_version_date() {
    let (service, _sink) = service_with_sink();

    let result = service
        .resolve("prices.equity/AAPL@20260115", &caller())
        .unwrap();

    assert_eq!(result.source_type, SourceType::Snowflake);
    assert_eq!(result.path, "prices.equity");
    assert_eq!(
        result.query.as_deref(),
        Some("SELECT s,p FROM E WHERE symbol = 'AAPL' AND trade_date = TO_DATE('20260115','YYYYMMDD')")
    );
    assert_eq!(
        result.connection.get("account"),
        Some(&serde_json::json!("acme"))
    );
    assert!(!result.connection.contains_key("query"));
}

#[tokio::test]
async fn resolve_wildcard_and_latest() {
    let (service, _sink) = service_with_sink();

    let result = service
        .resolve("prices.equity/ALL@latest", &caller())
        .unwrap();

    let query = result.query.unwrap();
    assert!(query.contains("1=1"), "wildcard filter collapses: {query}");
    assert!(query.contains("'__LATEST__'"), "latest sentinel: {query}");
}

#[tokio::test]
async fn unknown_moniker_is_not_found() {
    let (service, _sink) = service_with_sink();
    let err = service.resolve("nothing.here/at-all", &caller()).unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn node_without_reachable_binding_is_no_binding() {
    let (service, _sink) = service_with_sink();
    // "prices" exists but neither it nor any ancestor carries a binding.
    let err = service.resolve("prices", &caller()).unwrap_err();
    assert_eq!(err.kind(), "no_binding");
}

#[tokio::test]
async fn malformed_moniker_is_invalid() {
    let (service, _sink) = service_with_sink();
    let err = service.resolve("Not..A..Moniker//", &caller()).unwrap_err();
    assert_eq!(err.kind(), "invalid_moniker");
}

#[tokio::test]
async fn namespace_is_advisory_for_lookup() {
    let (service, _sink) = service_with_sink();
    let plain = service.resolve("prices.equity/AAPL", &caller()).unwrap();
    let scoped = service
        .resolve("user@prices.equity/AAPL", &caller())
        .unwrap();
    assert_eq!(plain.path, scoped.path);
}

#[tokio::test]
async fn expired_deadline_cancels_with_internal_error() {
    let (service, _sink) = service_with_sink();
    let err = service
        .resolve_with_deadline(
            "prices.equity/AAPL",
            &caller(),
            Some(Instant::now() - std::time::Duration::from_millis(1)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "internal");
    assert!(err.to_string().contains("cancelled"));
}

#[tokio::test]
async fn batch_resolve_reports_per_item() {
    let (service, _sink) = service_with_sink();
    let items = service.resolve_batch(
        &[
            "prices.equity/AAPL".to_string(),
            "nothing.here".to_string(),
        ],
        &caller(),
    );
    assert_eq!(items.len(), 2);
    assert!(items[0].result.is_some());
    assert_eq!(items[1].error_kind.as_deref(), Some("not_found"));
}

// =============================================================================
// DEPRECATION REDIRECT
// =============================================================================

#[tokio::test]
async fn deprecated_node_redirects_to_successor() {
    let (service, _sink) = service_with_sink();

    let result = service.resolve("rates.libor/usd", &caller()).unwrap();

    // Identity stays with the requested node; the binding comes from the
    // successor.
    assert_eq!(result.path, "rates.libor/usd");
    assert_eq!(result.redirected_from.as_deref(), Some("rates.libor/usd"));
    assert_eq!(result.successor.as_deref(), Some("rates.sofr/usd"));
    assert_eq!(result.status, NodeStatus::Deprecated);
    assert_eq!(
        result.deprecation_message.as_deref(),
        Some("LIBOR publication ended")
    );
    assert_eq!(
        result.query.as_deref(),
        Some("SELECT rate FROM SOFR WHERE ccy = 'usd'")
    );
}

#[tokio::test]
async fn broken_successor_degrades_to_last_reached_node() {
    let sink = Arc::new(MemorySink::new());
    let definition = CatalogDefinition::from_yaml_str(
        r#"
rates.libor/usd:
  status: DEPRECATED
  successor: rates.gone/usd
  source_binding:
    type: snowflake
    config:
      query: "SELECT 1"
"#,
    )
    .unwrap();
    let service = MonikerService::from_definition(test_config(), definition, sink).unwrap();

    // The successor is missing; the request still succeeds from the
    // deprecated node's own binding.
    let result = service.resolve("rates.libor/usd", &caller()).unwrap();
    assert_eq!(result.path, "rates.libor/usd");
    assert!(result.redirected_from.is_none());
    assert_eq!(result.query.as_deref(), Some("SELECT 1"));
}

// =============================================================================
// GOVERNANCE
// =============================================================================

#[tokio::test]
async fn blocked_reload_leaves_catalog_untouched() {
    let (service, _sink) = service_with_sink();

    // Remove rates.libor/usd and change the equity query: both breaking.
    let replacement = CatalogDefinition::from_yaml_str(
        r#"
prices:
  ownership:
    accountable_owner: alice
prices.equity:
  source_binding:
    type: snowflake
    config:
      account: acme
      database: marketdata
      query: "SELECT something_else FROM E"
    allowed_operations: [READ]
rates.sofr/usd:
  source_binding:
    type: snowflake
    config:
      account: acme
      query: "SELECT rate FROM SOFR WHERE {filter[0]:ccy}"
"#,
    )
    .unwrap();

    let report = service.reload_catalog(replacement, true, "ops").unwrap();
    assert!(!report.applied);
    assert!(report.has_breaking_changes);
    assert_eq!(report.removed_count, 1);
    assert_eq!(report.binding_changed_count, 1);

    // Old snapshot still serves.
    let result = service.resolve("rates.libor/usd", &caller()).unwrap();
    assert_eq!(result.successor.as_deref(), Some("rates.sofr/usd"));
}

#[tokio::test]
async fn applied_reload_purges_cache_and_serves_new_catalog() {
    let (service, _sink) = service_with_sink();
    let before = service.resolve("prices.equity/AAPL", &caller()).unwrap();

    let replacement = CatalogDefinition::from_yaml_str(
        r#"
prices.equity:
  source_binding:
    type: snowflake
    config:
      account: acme
      query: "SELECT v2 FROM E WHERE {filter[0]:symbol}"
"#,
    )
    .unwrap();
    let report = service.reload_catalog(replacement, false, "ops").unwrap();
    assert!(report.applied);

    let after = service.resolve("prices.equity/AAPL", &caller()).unwrap();
    assert_ne!(before.query, after.query);
    assert!(after.query.unwrap().starts_with("SELECT v2"));
}

#[tokio::test]
async fn submit_and_approve_lifecycle() {
    let (service, _sink) = service_with_sink();

    let proposal = MonikerProposal::new("foo.bar/baz").with_binding(
        serde_yaml::from_str(
            r#"
type: rest
config:
  base_url: https://foo.internal
  query: "/baz/{segments[0]}"
"#,
        )
        .unwrap(),
    );
    let request = service
        .submit_request(Some("submit-token"), proposal, "alice")
        .unwrap();

    // The submit token cannot approve.
    let err = service
        .approve_request(Some("submit-token"), &request.id, "bob")
        .unwrap_err();
    assert_eq!(err.kind(), "forbidden");

    service
        .approve_request(Some("approve-token"), &request.id, "bob")
        .unwrap();

    let resolved = service.resolve("foo.bar/baz", &caller()).unwrap();
    assert_eq!(resolved.status, NodeStatus::Active);
    assert_eq!(resolved.source_type, SourceType::Rest);
    assert_eq!(resolved.query.as_deref(), Some("/baz/baz"));
}

#[tokio::test]
async fn status_update_purges_affected_cache_entries() {
    let (service, _sink) = service_with_sink();
    service.resolve("prices.equity/AAPL", &caller()).unwrap();

    service
        .update_node_status(
            Some("approve-token"),
            "prices.equity",
            NodeStatus::Deprecated,
            "bob",
            StatusMetadata {
                deprecation_message: Some("use v2".into()),
                ..Default::default()
            },
        )
        .unwrap();

    // A fresh resolve must see the deprecation, not the cached entry.
    let result = service.resolve("prices.equity/AAPL", &caller()).unwrap();
    assert_eq!(result.status, NodeStatus::Deprecated);
    assert_eq!(result.deprecation_message.as_deref(), Some("use v2"));
}

// =============================================================================
// OWNERSHIP
// =============================================================================

#[tokio::test]
async fn ownership_rolls_up_field_wise() {
    let (service, _sink) = service_with_sink();

    let result = service.resolve("prices.equity/AAPL", &caller()).unwrap();
    assert_eq!(result.ownership.accountable_owner.as_deref(), Some("alice"));
    assert_eq!(
        result.ownership.support_channel.as_deref(),
        Some("#equity-data")
    );
    assert!(result.ownership.data_specialist.is_none());
}

// =============================================================================
// READ SURFACE
// =============================================================================

#[tokio::test]
async fn describe_list_lineage_tree_search_stats() {
    let (service, _sink) = service_with_sink();

    let described = service.describe("prices.equity", &caller()).unwrap();
    assert_eq!(described.node.display_name.as_deref(), Some("Equity prices"));
    assert!(described.binding_fingerprint.is_some());
    assert_eq!(
        described.effective_ownership.accountable_owner.as_deref(),
        Some("alice")
    );

    let children = service.list("prices", &caller()).unwrap();
    assert_eq!(children, vec!["prices.equity".to_string()]);

    let lineage = service.lineage("rates.libor/usd", &caller()).unwrap();
    assert_eq!(lineage.successors, vec!["rates.sofr/usd".to_string()]);

    let tree = service.tree();
    assert_eq!(tree.len(), 4);
    assert!(tree.iter().any(|e| e.path == "rates.sofr/usd" && e.has_binding));

    let hits = service.search("equity");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "prices.equity");

    let stats = service.stats();
    assert_eq!(stats.total_nodes, 4);
    assert_eq!(stats.by_status.get("DEPRECATED"), Some(&1));
    assert_eq!(stats.by_source_type.get("snowflake"), Some(&2));
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_resolves_never_see_a_mix() {
    let (service, _sink) = service_with_sink();
    let service = Arc::new(service);

    let old_query =
        "SELECT s,p FROM E WHERE symbol = 'AAPL' AND trade_date = CURRENT_DATE()".to_string();
    let new_query = "SELECT v2 FROM E WHERE symbol = 'AAPL'".to_string();

    let mut readers = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        let old_query = old_query.clone();
        let new_query = new_query.clone();
        readers.push(std::thread::spawn(move || {
            for _ in 0..200 {
                match service.resolve("prices.equity/AAPL", &Caller::anonymous()) {
                    Ok(result) => {
                        let query = result.query.unwrap();
                        assert!(
                            query == old_query || query == new_query,
                            "resolve saw a mixed snapshot: {query}"
                        );
                    }
                    Err(err) => panic!("resolve failed mid-reload: {err}"),
                }
            }
        }));
    }

    let old_def = CatalogDefinition::from_yaml_str(CATALOG).unwrap();
    let new_def = CatalogDefinition::from_yaml_str(
        r##"
prices:
  ownership:
    accountable_owner: alice
prices.equity:
  ownership:
    support_channel: "#equity-data"
  source_binding:
    type: snowflake
    config:
      account: acme
      query: "SELECT v2 FROM E WHERE {filter[0]:symbol}"
rates.libor/usd:
  status: DEPRECATED
  successor: rates.sofr/usd
rates.sofr/usd:
  source_binding:
    type: snowflake
    config:
      query: "SELECT rate FROM SOFR WHERE {filter[0]:ccy}"
"##,
    )
    .unwrap();
    for _ in 0..20 {
        service.reload_catalog(new_def.clone(), false, "ops").unwrap();
        service.reload_catalog(old_def.clone(), false, "ops").unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
}

// =============================================================================
// CACHE & TELEMETRY
// =============================================================================

#[tokio::test]
async fn cache_and_telemetry_counters() {
    let (service, sink) = service_with_sink();

    service.resolve("prices.equity/AAPL", &caller()).unwrap();
    service.resolve("prices.equity/AAPL", &caller()).unwrap();
    let _ = service.resolve("missing.domain", &caller());

    let health = service.health();
    assert_eq!(health.catalog_nodes, 4);
    assert_eq!(health.cache_entries, 1);
    assert_eq!(health.cache.hits, 1);
    assert!(health.telemetry.emitted >= 3);

    // Stopping drains the queue into the sink.
    service.stop().await.unwrap();
    let events = sink.take();
    assert_eq!(events.len(), 3);
    assert!(events
        .iter()
        .all(|e| e.operation == Operation::Resolve));
    assert_eq!(
        events
            .iter()
            .filter(|e| e.outcome == Outcome::Success)
            .count(),
        2
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| e.outcome == Outcome::NotFound)
            .count(),
        1
    );
}

#[tokio::test]
async fn deprecated_resolve_is_flagged_in_telemetry() {
    let (service, sink) = service_with_sink();
    service.resolve("rates.libor/usd", &caller()).unwrap();
    service.stop().await.unwrap();

    let events = sink.take();
    assert_eq!(events.len(), 1);
    assert!(events[0].deprecated);
    assert_eq!(events[0].successor.as_deref(), Some("rates.sofr/usd"));
    assert_eq!(events[0].redirected_from.as_deref(), Some("rates.libor/usd"));
}

#[tokio::test]
async fn reload_report_error_view() {
    use moniker_core::EnsureApplied;

    let (service, _sink) = service_with_sink();
    let report = service
        .reload_catalog(CatalogDefinition::default(), true, "ops")
        .unwrap();
    let err = report.ensure_applied().unwrap_err();
    assert!(matches!(err, ServiceError::BreakingReloadRejected));
    assert_eq!(err.kind(), "breaking_reload_rejected");
}
