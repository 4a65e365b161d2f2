use std::sync::Arc;

use anyhow::Context;
use futures::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use sluice::config::{self, Config, DbInstanceConfig};
use sluice::parser::StatementType;
use sluice::pool::{BackendConnection, ConnectionError, Connector, DbGroup};
use sluice::router::RouteService;
use sluice::session::SessionState;

/// Connector for inspection runs: never opens a backend connection
struct OfflineConnector;

impl Connector for OfflineConnector {
    fn connect(
        &self,
        config: Arc<DbInstanceConfig>,
        _schema: Option<String>,
    ) -> BoxFuture<'static, Result<Box<dyn BackendConnection>, ConnectionError>> {
        Box::pin(async move {
            Err(ConnectionError::Connect(format!(
                "{} is not contacted in explain mode",
                config.addr()
            )))
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut paths = vec!["config/sluice.toml".to_string(), "sluice.toml".to_string()];
    if let Some(path) = std::env::args().nth(1) {
        paths.insert(0, path);
    }
    let (_, config) = config::load_or_default(&paths[..]).context("loading configuration")?;

    let router = RouteService::from_config(&config.route);
    let group = config
        .db_groups
        .first()
        .map(|g| DbGroup::new(g, &config.pool, Arc::new(OfflineConnector)));
    let schema = config.schemas.first();

    info!(
        schema = schema.map(|s| s.name.as_str()).unwrap_or("NULL"),
        group = group.as_ref().map(|g| g.name()).unwrap_or("-"),
        cache = config.route.cache_enabled,
        "Explaining statements from stdin"
    );

    let mut state = SessionState::new("explain", schema.map(|s| s.name.clone()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let sql = line.trim();
        if sql.is_empty() {
            continue;
        }
        explain(&config, &router, group.as_ref(), &mut state, sql);
    }

    Ok(())
}

fn explain(
    config: &Config,
    router: &RouteService,
    group: Option<&DbGroup>,
    state: &mut SessionState,
    sql: &str,
) {
    let schema = state.schema.as_deref().and_then(|name| config.schema(name));
    let stmt_type = router.analyzer().classify(sql);
    let is_explain = router.analyzer().is_explain(sql);

    match router.route(schema, stmt_type, sql, state, is_explain) {
        Ok(Some(decision)) => println!("{}\t{}", stmt_type.as_str(), decision),
        Ok(None) => println!("{}\tno route", stmt_type.as_str()),
        Err(e) => println!("{}\terror {}: {}", stmt_type.as_str(), e.vendor_code(), e),
    }

    if let Some(group) = group {
        match router.route_rw_split(stmt_type, sql, state, group) {
            Ok(Some(instance)) => println!("\tinstance={}", instance.name()),
            Ok(None) => println!("\tinstance=-"),
            Err(e) => warn!(error = %e, "Read/write split failed"),
        }
    }

    match stmt_type {
        StatementType::Begin => state.begin_transaction(),
        StatementType::Commit | StatementType::Rollback => state.end_transaction(),
        _ => {}
    }
}
