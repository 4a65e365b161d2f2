//! Route cache eligibility and race tolerance

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::Level;

use sluice::config::{RouteConfig, SchemaConfig};
use sluice::parser::StatementType;
use sluice::router::{
    DefaultRouteStrategy, RouteDecision, RouteError, RouteService, RouteStrategy,
};
use sluice::session::SessionState;

use crate::schema;

/// Default strategy that counts how often it is consulted
#[derive(Default)]
struct CountingStrategy {
    calls: AtomicUsize,
}

impl RouteStrategy for CountingStrategy {
    fn route(
        &self,
        schema: Option<&SchemaConfig>,
        stmt_type: StatementType,
        sql: &str,
        state: &SessionState,
        is_explain: bool,
    ) -> Result<Option<RouteDecision>, RouteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DefaultRouteStrategy.route(schema, stmt_type, sql, state, is_explain)
    }
}

fn service() -> (RouteService, Arc<CountingStrategy>) {
    let strategy = Arc::new(CountingStrategy::default());
    let svc = RouteService::new(&RouteConfig::default(), strategy.clone());
    (svc, strategy)
}

fn state() -> SessionState {
    SessionState::new("app", Some("orders".to_string()))
}

#[test]
fn test_repeated_select_hits_cache() {
    let (svc, strategy) = service();
    let mut state = state();
    let sql = "select * from t where id = 1";

    let first = svc
        .route(Some(&schema()), StatementType::Select, sql, &mut state, false)
        .unwrap()
        .unwrap();
    let second = svc
        .route(Some(&schema()), StatementType::Select, sql, &mut state, false)
        .unwrap()
        .unwrap();

    assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
    assert_eq!(svc.cache().unwrap().len(), 1);
}

#[test]
fn test_writes_bypass_cache() {
    let (svc, strategy) = service();
    let mut state = state();
    let sql = "insert into t values (1)";

    for _ in 0..2 {
        svc.route(Some(&schema()), StatementType::Insert, sql, &mut state, false)
            .unwrap();
    }

    assert_eq!(strategy.calls.load(Ordering::SeqCst), 2);
    assert!(svc.cache().unwrap().is_empty());
}

#[test]
fn test_remaining_sql_blocks_insert() {
    let (svc, _) = service();
    let mut state = state();
    state.set_remaining_sql(Some("select 2".to_string()));

    svc.route(Some(&schema()), StatementType::Select, "select 1", &mut state, false)
        .unwrap();
    assert!(svc.cache().unwrap().is_empty());
}

#[test]
fn test_cache_hit_ends_parse() {
    let (svc, _) = service();
    let mut state = state();

    svc.route(Some(&schema()), StatementType::Select, "select 1", &mut state, false)
        .unwrap();

    state.set_remaining_sql(Some("select 2".to_string()));
    svc.route(Some(&schema()), StatementType::Select, "select 1", &mut state, false)
        .unwrap();
    assert!(!state.has_remaining_sql());
}

#[test]
fn test_explain_is_not_cached() {
    let (svc, _) = service();
    let mut state = state();

    svc.route(Some(&schema()), StatementType::Select, "select 1", &mut state, true)
        .unwrap();
    assert!(svc.cache().unwrap().is_empty());
}

#[test]
fn test_key_separates_users_and_schemas() {
    let (svc, strategy) = service();
    let mut app = state();
    let mut report = SessionState::new("report", Some("orders".to_string()));

    svc.route(Some(&schema()), StatementType::Select, "select 1", &mut app, false)
        .unwrap();
    svc.route(Some(&schema()), StatementType::Select, "select 1", &mut report, false)
        .unwrap();
    let other = SchemaConfig::new("billing", "dn9");
    svc.route(Some(&other), StatementType::Select, "select 1", &mut app, false)
        .unwrap();

    assert_eq!(strategy.calls.load(Ordering::SeqCst), 3);
    assert_eq!(svc.cache().unwrap().len(), 3);
}

#[test]
fn test_disabled_cache() {
    let config = RouteConfig {
        cache_enabled: false,
        ..RouteConfig::default()
    };
    let svc = RouteService::from_config(&config);
    let mut state = state();

    svc.route(Some(&schema()), StatementType::Select, "select 1", &mut state, false)
        .unwrap();
    assert!(svc.cache().is_none());
}

#[test]
fn test_debug_tracing_bypasses_cache() {
    let (svc, strategy) = service();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut state = state();
        for _ in 0..2 {
            svc.route(Some(&schema()), StatementType::Select, "select 1", &mut state, false)
                .unwrap();
        }
    });

    assert_eq!(strategy.calls.load(Ordering::SeqCst), 2);
    assert!(svc.cache().unwrap().is_empty());
}

#[test]
fn test_concurrent_identical_routes_converge() {
    let (svc, _) = service();
    let svc = Arc::new(svc);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || {
                let mut state = state();
                svc.route(Some(&schema()), StatementType::Select, "select 42", &mut state, false)
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();

    let decisions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(svc.cache().unwrap().len(), 1);
    assert!(decisions.windows(2).all(|w| w[0] == w[1]));
}
