//! Directive detection and hint-driven route decisions

use sluice::hint::{HintDirective, HintGrammar, HintSyntax, HINT_TYPE_KEY};
use sluice::parser::StatementType;
use sluice::router::RouteError;
use sluice::session::SessionState;

use crate::{router, schema};

fn directive(sql: &str) -> Option<HintDirective> {
    HintGrammar::default()
        .split(sql)
        .map(|span| HintDirective::from_body(span.syntax, span.body))
}

#[test]
fn test_statements_without_comment_have_no_directive() {
    let grammar = HintGrammar::default();
    for sql in [
        "select 1",
        " /*master*/ select 1",
        "-- master\nselect 1",
        "select /*master*/ 1",
        "",
    ] {
        assert_eq!(grammar.hint_offset(sql), -1, "{:?}", sql);
        assert!(grammar.split(sql).is_none());
    }
}

#[test]
fn test_structured_sql_directive() {
    let d = directive("/*!dble:sql=select 1*/select * from t").unwrap();
    assert_eq!(d.syntax, HintSyntax::Structured);
    assert_eq!(d.directive_type, "sql");
    assert_eq!(d.value, "select 1");

    let map = d.raw_map();
    assert_eq!(map.get(HINT_TYPE_KEY).map(String::as_str), Some("sql"));
    assert_eq!(map.get("sql").map(String::as_str), Some("select 1"));
}

#[test]
fn test_hash_marker_and_quoted_value() {
    let d = directive("/* #dble:shardingnode='dn2' */ update t set a = 1").unwrap();
    assert_eq!(d.directive_type, "shardingnode");
    assert_eq!(d.value, "dn2");
}

#[test]
fn test_master_keyword_forms() {
    for sql in ["/*master*/select 1", "/* master */select 1"] {
        let d = directive(sql).unwrap();
        assert_eq!(d.syntax, HintSyntax::Keyword);
        assert_eq!(d.directive_type, "master");
        assert_eq!(d.value, "master");
    }
}

#[test]
fn test_uproxy_dest_keyword() {
    let d = directive("/*uproxy_dest:nodeA*/select 1").unwrap();
    assert_eq!(d.directive_type, "uproxy_dest");
    assert_eq!(d.value, "nodeA");
}

#[test]
fn test_unterminated_comment_routes_as_plain_sql() {
    let svc = router();
    let mut state = SessionState::new("app", Some("orders".to_string()));
    let sql = "/*!dble:sql=select 1";

    let decision = svc
        .route(Some(&schema()), StatementType::Select, sql, &mut state, false)
        .unwrap()
        .unwrap();
    assert_eq!(decision.node, "dn1");
    assert_eq!(decision.statement, sql);
}

#[test]
fn test_hint_sql_never_runs_on_slave() {
    let svc = router();
    let mut state = SessionState::new("app", Some("orders".to_string()));

    // the payload alone would be allowed on a replica
    let decision = svc
        .route(
            Some(&schema()),
            StatementType::Select,
            "/*!dble:sql=select id from t where id = 1*/select * from t",
            &mut state,
            false,
        )
        .unwrap()
        .unwrap();
    assert!(!decision.run_on_slave);
    assert_eq!(decision.statement, "select * from t");
}

#[test]
fn test_keyword_routes() {
    let svc = router();
    let mut state = SessionState::new("app", Some("orders".to_string()));

    let master = svc
        .route(Some(&schema()), StatementType::Select, "/*master*/select 1", &mut state, false)
        .unwrap()
        .unwrap();
    assert!(master.force_master);

    let slave = svc
        .route(Some(&schema()), StatementType::Select, "/*slave*/select 1", &mut state, false)
        .unwrap()
        .unwrap();
    assert!(slave.run_on_slave);
    assert!(!slave.force_master);

    let node = svc
        .route(Some(&schema()), StatementType::Select, "/*uproxy_dest:dn2*/select 1", &mut state, false)
        .unwrap()
        .unwrap();
    assert_eq!(node.node, "dn2");
    assert_eq!(node.statement, "select 1");
}

#[test]
fn test_directive_errors() {
    let svc = router();
    let mut state = SessionState::new("app", Some("orders".to_string()));

    let err = svc
        .route(Some(&schema()), StatementType::Select, "/*uproxy_dest:*/select 1", &mut state, false)
        .unwrap_err();
    assert!(matches!(err, RouteError::MalformedDirective { .. }));

    let err = svc
        .route(Some(&schema()), StatementType::Select, "/*!dble:plan=fast*/select 1", &mut state, false)
        .unwrap_err();
    assert_eq!(err.to_string(), "Not supported hint sql type : plan");

    let err = svc
        .route(None, StatementType::Select, "/*!dble:shardingnode=dn1*/select 1", &mut state, false)
        .unwrap_err();
    assert_eq!(err.vendor_code(), 1046);
}
