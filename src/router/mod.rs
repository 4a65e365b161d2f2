mod cache;
mod decision;
mod error;
mod handler;
mod rw_split;
mod strategy;

pub use cache::{cache_key, RouteCache, SqlRouteCache};
pub use decision::RouteDecision;
pub use error::RouteError;
pub use handler::{
    keyword_handlers, structured_handlers, DirectiveHandler, ForwardTarget, ForwardingHandler,
    HandlerRegistry, HintContext, HintSqlHandler, NodeHandler,
};
pub use rw_split::{RouteTarget, RwSplitter};
pub use strategy::{DefaultRouteStrategy, RouteStrategy};

use std::sync::Arc;

use tracing::{debug, field, info, info_span, Level};

use crate::config::{RouteConfig, SchemaConfig};
use crate::hint::{HintDirective, HintGrammar, HintSpan, HintSyntax};
use crate::metrics::metrics;
use crate::parser::{SqlAnalyzer, StatementType};
use crate::pool::{DbGroup, DbInstance};
use crate::protocol::error_code;
use crate::session::SessionState;

/// Route decision engine
///
/// Built once at startup and shared by every session. The directive
/// registries are fixed at construction.
pub struct RouteService {
    grammar: HintGrammar,
    analyzer: SqlAnalyzer,
    strategy: Arc<dyn RouteStrategy>,
    cache: Option<Arc<dyn RouteCache>>,
    structured: HandlerRegistry,
    keyword: HandlerRegistry,
}

impl RouteService {
    pub fn new(config: &RouteConfig, strategy: Arc<dyn RouteStrategy>) -> Self {
        let cache: Option<Arc<dyn RouteCache>> = if config.cache_enabled {
            Some(Arc::new(SqlRouteCache::new(config.cache_capacity)))
        } else {
            None
        };

        Self {
            grammar: HintGrammar::new(config.annotation.clone()),
            analyzer: SqlAnalyzer::new(),
            strategy,
            cache,
            structured: structured_handlers(),
            keyword: keyword_handlers(),
        }
    }

    /// Engine with the default strategy
    pub fn from_config(config: &RouteConfig) -> Self {
        Self::new(config, Arc::new(DefaultRouteStrategy))
    }

    /// Replace the route cache (or disable caching with `None`)
    pub fn with_cache(mut self, cache: Option<Arc<dyn RouteCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn grammar(&self) -> &HintGrammar {
        &self.grammar
    }

    pub fn analyzer(&self) -> &SqlAnalyzer {
        &self.analyzer
    }

    pub fn cache(&self) -> Option<&Arc<dyn RouteCache>> {
        self.cache.as_ref()
    }

    /// Decide where `sql` runs
    ///
    /// `Ok(None)` means no decision was produced and there is nothing to
    /// execute.
    pub fn route(
        &self,
        schema: Option<&SchemaConfig>,
        stmt_type: StatementType,
        sql: &str,
        state: &mut SessionState,
        is_explain: bool,
    ) -> Result<Option<Arc<RouteDecision>>, RouteError> {
        let span = info_span!("simple_route", route_result = field::Empty);
        let _enter = span.enter();

        let cache = if stmt_type == StatementType::Select && !tracing::enabled!(Level::DEBUG) {
            self.cache.as_ref()
        } else {
            None
        };

        let mut key = None;
        if let Some(cache) = cache {
            let k = cache_key(schema.map(|s| s.name.as_str()), &state.username, sql);
            if let Some(hit) = cache.get(&k) {
                state.end_parse();
                metrics().record_route_cache("hit");
                span.record("route_result", field::display(&hit));
                return Ok(Some(hit));
            }
            metrics().record_route_cache("miss");
            key = Some(k);
        }

        let decision = match self.route_uncached(schema, stmt_type, sql.trim(), state, is_explain) {
            Ok(decision) => decision.map(Arc::new),
            Err(e) => {
                metrics().record_route_error(e.kind_name());
                return Err(e);
            }
        };

        if let (Some(decision), Some(cache), Some(key)) = (&decision, cache, key) {
            if decision.cacheable && !state.has_remaining_sql() && cache.put_if_absent(key, Arc::clone(decision)) {
                metrics().record_route_cache("insert");
            }
        }

        if let Some(decision) = &decision {
            metrics().record_route(decision.target().as_str());
            span.record("route_result", field::display(decision));
        }
        Ok(decision)
    }

    fn route_uncached(
        &self,
        schema: Option<&SchemaConfig>,
        stmt_type: StatementType,
        sql: &str,
        state: &SessionState,
        is_explain: bool,
    ) -> Result<Option<RouteDecision>, RouteError> {
        match self.grammar.split(sql) {
            Some(span) => self.route_hint(schema, stmt_type, sql, span, state),
            None => self.strategy.route(schema, stmt_type, sql, state, is_explain),
        }
    }

    fn route_hint(
        &self,
        schema: Option<&SchemaConfig>,
        stmt_type: StatementType,
        sql: &str,
        span: HintSpan<'_>,
        state: &SessionState,
    ) -> Result<Option<RouteDecision>, RouteError> {
        let directive = self.parse_directive(sql, &span)?;

        let registry = match span.syntax {
            HintSyntax::Structured => &self.structured,
            HintSyntax::Keyword => &self.keyword,
        };
        let handler = registry
            .get(directive.directive_type.as_str())
            .ok_or_else(|| {
                info!(hint_type = %directive.directive_type, "Unsupported hint type");
                RouteError::UnsupportedDirective(directive.directive_type.clone())
            })?;

        let hint_stmt_type = if handler.payload_is_sql() {
            self.analyzer.classify(&directive.value)
        } else {
            stmt_type
        };
        debug!(
            hint_type = %directive.directive_type,
            hint_value = %directive.value,
            hint_stmt_type = hint_stmt_type.as_str(),
            "Routing by hint"
        );

        let ctx = HintContext {
            schema,
            stmt_type,
            real_sql: span.residual,
            state,
            directive: &directive,
            hint_stmt_type,
            strategy: self.strategy.as_ref(),
        };
        let mut decision = handler.route(&ctx)?;

        if handler.payload_is_sql() {
            if let Some(decision) = decision.as_mut() {
                decision.run_on_slave = false;
            }
        }
        Ok(decision)
    }

    fn parse_directive(&self, sql: &str, span: &HintSpan<'_>) -> Result<HintDirective, RouteError> {
        let directive = HintDirective::from_body(span.syntax, span.body);
        if directive.is_value_empty() {
            info!(sql = %sql, "Hint value is empty");
            return Err(RouteError::MalformedDirective {
                annotation: self.grammar.annotation().to_string(),
                statement: sql.to_string(),
            });
        }
        Ok(directive)
    }

    /// Pick the instance of `group` that should run `sql`
    ///
    /// `Ok(None)` only when the group has no instance to offer.
    pub fn route_rw_split(
        &self,
        stmt_type: StatementType,
        sql: &str,
        state: &SessionState,
        group: &DbGroup,
    ) -> Result<Option<Arc<DbInstance>>, RouteError> {
        let sql = sql.trim();
        let Some(span) = self.grammar.split(sql) else {
            let master = !RwSplitter::can_use_slave(stmt_type, state.in_transaction());
            return Ok(group.select(master));
        };

        let directive = self.parse_directive(sql, &span)?;
        let instance = match (span.syntax, directive.directive_type.as_str()) {
            (HintSyntax::Keyword, "master") => group.select(true),
            (HintSyntax::Keyword, "slave") => group.select(false),
            (HintSyntax::Keyword, "uproxy_dest") => {
                let instance = group.instance(&directive.value).ok_or_else(|| {
                    RouteError::sql(
                        error_code::ER_PARSE_ERROR,
                        "HY000",
                        format!("can't find the instance {}", directive.value),
                    )
                })?;
                Some(instance)
            }
            (HintSyntax::Structured, "db_type") => {
                match directive.value.to_ascii_lowercase().as_str() {
                    "master" => group.select(true),
                    "slave" => group.select(false),
                    other => {
                        return Err(RouteError::UnsupportedDirective(format!("db_type={}", other)))
                    }
                }
            }
            (_, other) => return Err(RouteError::UnsupportedDirective(other.to_string())),
        };

        if let Some(instance) = &instance {
            debug!(group = %group.name(), instance = %instance.name(), "Hint selected instance");
        }
        Ok(instance)
    }
}
