//! Sticky connection binding on read/write-split sessions

use std::sync::atomic::Ordering;

use sluice::parser::StatementType;
use sluice::protocol::Packet;

use crate::{parse_err, probe, query_text, Fixture, BACKEND_DISCONNECT_SQL, BACKEND_ERROR_SQL};

#[tokio::test]
async fn test_pinned_connection_is_reused() {
    let mut fx = Fixture::new();
    fx.session.set_current_sql("select 1");

    let (callback, seen) = probe();
    fx.session.execute(true, None, Some(callback)).await;
    assert_eq!(*seen.lock(), Some(true));
    assert!(fx.session.is_bound());
    let pinned = fx.session.bound_connection().unwrap().id();

    fx.session.execute(false, None, None).await;
    assert_eq!(fx.backend.opened(), 1);
    assert_eq!(fx.session.bound_connection().unwrap().id(), pinned);
    assert_eq!(fx.backend.instances_hit(), vec!["m1", "m1"]);
    assert_eq!(fx.drain_client().len(), 2);
}

#[tokio::test]
async fn test_origin_payload_is_forwarded() {
    let mut fx = Fixture::new();
    let origin = Packet::query("select 7").payload;

    fx.session.execute(true, Some(origin.clone()), None).await;
    let requests = fx.backend.requests.lock();
    assert_eq!(requests[0].1, origin);
}

#[tokio::test]
async fn test_release_waits_for_idle_session() {
    let flags: [fn(&mut sluice::session::SessionState); 5] = [
        |s| s.autocommit = false,
        |s| s.locked = true,
        |s| s.tx_started = true,
        |s| s.in_load_data = true,
        |s| s.in_prepare = true,
    ];

    for set_flag in flags {
        let mut fx = Fixture::new();
        fx.session.execute(true, Some(Packet::query("select 1").payload), None).await;

        set_flag(&mut fx.session.state);
        assert!(!fx.session.release_if_safe());
        assert!(fx.session.is_bound());
    }

    let mut fx = Fixture::new();
    fx.session.execute(true, Some(Packet::query("select 1").payload), None).await;
    assert!(fx.session.release_if_safe());
    assert!(!fx.session.is_bound());
    assert_eq!(fx.session.group().instance("m1").unwrap().idle_count(), 1);

    // nothing pinned any more
    assert!(!fx.session.release_if_safe());
}

#[tokio::test]
async fn test_transaction_keeps_statements_on_one_connection() {
    let mut fx = Fixture::new();
    fx.session.state.begin_transaction();

    fx.session.execute_hint(StatementType::Update, "update t set a = 1", None).await;
    fx.session.execute_hint(StatementType::Select, "select * from t", None).await;
    assert!(!fx.session.release_if_safe());
    assert_eq!(fx.backend.instances_hit(), vec!["m1", "m1"]);
    assert_eq!(fx.backend.opened(), 1);

    fx.session.state.end_transaction();
    assert!(fx.session.release_if_safe());
}

#[tokio::test]
async fn test_bind_overwrites_without_closing() {
    let mut fx = Fixture::new();
    let instance = fx.session.group().instance("s1").unwrap();

    let first = instance.acquire_connection(Some("orders"), false).await.unwrap();
    let second = instance.acquire_connection(Some("orders"), false).await.unwrap();
    let (first_id, second_id) = (first.id(), second.id());

    fx.session.bind(first);
    fx.session.bind(second);
    assert_eq!(fx.session.bound_connection().unwrap().id(), second_id);
    assert!(!fx.backend.is_closed(first_id));
}

#[tokio::test]
async fn test_unbind_does_not_release() {
    let mut fx = Fixture::new();
    fx.session.execute(true, Some(Packet::query("select 1").payload), None).await;

    let conn = fx.session.unbind().unwrap();
    assert!(!fx.session.is_bound());
    assert_eq!(fx.session.group().instance("m1").unwrap().idle_count(), 0);
    assert!(conn.is_usable());
}

#[tokio::test]
async fn test_close_keeps_pin_and_next_statement_reconnects() {
    let mut fx = Fixture::new();
    fx.session.execute(true, Some(Packet::query("select 1").payload), None).await;
    let old = fx.session.bound_connection().unwrap().id();

    fx.session.close("client quit");
    assert!(fx.session.is_bound());
    assert!(fx.backend.is_closed(old));

    fx.session.execute(true, Some(Packet::query("select 2").payload), None).await;
    assert_eq!(fx.backend.opened(), 2);
    assert_ne!(fx.session.bound_connection().unwrap().id(), old);
}

#[tokio::test]
async fn test_acquisition_failure_reports_error() {
    let mut fx = Fixture::new();
    fx.backend.refuse.store(true, Ordering::SeqCst);

    let (callback, seen) = probe();
    fx.session.execute(true, Some(Packet::query("select 1").payload), Some(callback)).await;

    assert_eq!(*seen.lock(), Some(false));
    assert!(!fx.session.is_bound());
    let packets = fx.drain_client();
    assert_eq!(packets.len(), 1);
    let err = parse_err(&packets[0]);
    assert_eq!(err.error_code, 1105);
    assert_eq!(err.sql_state, "HY000");
    assert!(err.error_message.contains("m1"));
}

#[tokio::test]
async fn test_backend_error_response_is_forwarded() {
    let mut fx = Fixture::new();
    let (callback, seen) = probe();

    fx.session
        .execute_hint(StatementType::Select, BACKEND_ERROR_SQL, Some(callback))
        .await;

    assert_eq!(*seen.lock(), Some(false));
    let packets = fx.drain_client();
    assert_eq!(parse_err(&packets[0]).error_code, 1054);
    // the connection survives an error response
    assert!(fx.session.bound_connection().unwrap().is_usable());
}

#[tokio::test]
async fn test_backend_disconnect_closes_pinned_connection() {
    let mut fx = Fixture::new();
    let (callback, seen) = probe();

    fx.session
        .execute_hint(StatementType::Insert, BACKEND_DISCONNECT_SQL, Some(callback))
        .await;

    assert_eq!(*seen.lock(), Some(false));
    assert!(!fx.session.bound_connection().unwrap().is_usable());
    assert_eq!(parse_err(&fx.drain_client()[0]).error_code, 1105);
}

#[tokio::test]
async fn test_hint_routes_to_named_instance() {
    let mut fx = Fixture::new();
    fx.session
        .execute_hint(StatementType::Select, "/*uproxy_dest:s2*/select 1", None)
        .await;

    assert_eq!(fx.backend.instances_hit(), vec!["s2"]);
    let requests = fx.backend.requests.lock();
    assert_eq!(query_text(&requests[0].1), "/*uproxy_dest:s2*/select 1");
}

#[tokio::test]
async fn test_hint_routing_error_becomes_err_packet() {
    let mut fx = Fixture::new();
    let (callback, seen) = probe();

    fx.session
        .execute_hint(StatementType::Select, "/*!dble:bogus=1*/select 1", Some(callback))
        .await;

    let packets = fx.drain_client();
    assert_eq!(packets.len(), 1);
    let err = parse_err(&packets[0]);
    assert_eq!(err.error_code, 1064);
    assert_eq!(err.sql_state, "HY000");
    assert_eq!(err.error_message, "Not supported hint sql type : bogus");

    assert_eq!(*seen.lock(), None);
    assert!(!fx.session.is_bound());
    assert_eq!(fx.backend.opened(), 0);
}

#[tokio::test]
async fn test_hint_on_pinned_session_uses_pin() {
    let mut fx = Fixture::new();
    fx.session.state.begin_transaction();
    fx.session.execute_hint(StatementType::Select, "select 1", None).await;

    fx.session
        .execute_hint(StatementType::Select, "/*uproxy_dest:s1*/select 1", None)
        .await;
    assert_eq!(fx.backend.instances_hit(), vec!["m1", "m1"]);
}

#[tokio::test]
async fn test_unknown_instance_in_long_statement() {
    let mut fx = Fixture::new();
    let sql = format!("/*uproxy_dest:nowhere*/select '{}'", "x".repeat(2000));

    fx.session.execute_hint(StatementType::Select, &sql, None).await;
    let err = parse_err(&fx.drain_client()[0]);
    assert_eq!(err.error_code, 1064);
    assert_eq!(err.error_message, "can't find the instance nowhere");
}
