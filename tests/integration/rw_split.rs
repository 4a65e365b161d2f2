//! Instance selection for read/write-split sessions

use sluice::parser::StatementType;
use sluice::router::RouteError;
use sluice::session::SessionState;

use crate::{group, router, MockBackend};

fn pick(stmt_type: StatementType, sql: &str, state: &SessionState) -> Result<Option<String>, RouteError> {
    let backend = MockBackend::new();
    let group = group(&backend);
    router()
        .route_rw_split(stmt_type, sql, state, &group)
        .map(|i| i.map(|i| i.name().to_string()))
}

#[test]
fn test_reads_use_replicas_outside_transaction() {
    let state = SessionState::default();
    let name = pick(StatementType::Select, "select 1", &state).unwrap().unwrap();
    assert!(name.starts_with('s'));

    let write = pick(StatementType::Update, "update t set a = 1", &state).unwrap();
    assert_eq!(write.as_deref(), Some("m1"));
}

#[test]
fn test_reads_stay_on_master_in_transaction() {
    let mut state = SessionState::default();
    state.begin_transaction();
    assert_eq!(
        pick(StatementType::Select, "select 1", &state).unwrap().as_deref(),
        Some("m1")
    );

    let mut state = SessionState::default();
    state.autocommit = false;
    assert_eq!(
        pick(StatementType::Select, "select 1", &state).unwrap().as_deref(),
        Some("m1")
    );
}

#[test]
fn test_keyword_directives_pick_instances() {
    let state = SessionState::default();
    assert_eq!(
        pick(StatementType::Select, "/*master*/select 1", &state).unwrap().as_deref(),
        Some("m1")
    );
    assert!(pick(StatementType::Update, "/*slave*/update t set a = 1", &state)
        .unwrap()
        .unwrap()
        .starts_with('s'));
    assert_eq!(
        pick(StatementType::Select, "/*uproxy_dest:s2*/select 1", &state).unwrap().as_deref(),
        Some("s2")
    );
}

#[test]
fn test_db_type_directive() {
    let state = SessionState::default();
    assert_eq!(
        pick(StatementType::Select, "/*!dble:db_type=master*/select 1", &state)
            .unwrap()
            .as_deref(),
        Some("m1")
    );

    let err = pick(StatementType::Select, "/*!dble:db_type=backup*/select 1", &state).unwrap_err();
    assert_eq!(err, RouteError::UnsupportedDirective("db_type=backup".to_string()));
}

#[test]
fn test_unknown_instance_and_directive() {
    let state = SessionState::default();

    let err = pick(StatementType::Select, "/*uproxy_dest:s9*/select 1", &state).unwrap_err();
    assert_eq!(err.vendor_code(), 1064);
    assert_eq!(err.sql_state(), Some("HY000"));
    assert!(err.to_string().contains("can't find the instance"));

    let err = pick(StatementType::Select, "/*!dble:sql=select 1*/select 1", &state).unwrap_err();
    assert_eq!(err, RouteError::UnsupportedDirective("sql".to_string()));
}

#[test]
fn test_stray_byte_before_keyword_is_rejected() {
    let state = SessionState::default();
    let err = pick(StatementType::Select, "/*Xslave*/select 1", &state).unwrap_err();
    assert_eq!(err, RouteError::UnsupportedDirective("xslave".to_string()));
}

#[test]
fn test_unterminated_directive_splits_normally() {
    let state = SessionState::default();
    assert_eq!(
        pick(StatementType::Insert, "/*slave insert into t values (1)", &state)
            .unwrap()
            .as_deref(),
        Some("m1")
    );
}
