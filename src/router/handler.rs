//! Directive handlers and their registries

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SchemaConfig;
use crate::hint::HintDirective;
use crate::parser::StatementType;
use crate::protocol::error_code;
use crate::session::SessionState;

use super::decision::RouteDecision;
use super::error::RouteError;
use super::rw_split::RwSplitter;
use super::strategy::{no_database_selected, RouteStrategy};

/// Inputs available to a directive handler
pub struct HintContext<'a> {
    pub schema: Option<&'a SchemaConfig>,
    /// Type of the statement the client sent
    pub stmt_type: StatementType,
    /// Statement text after the directive comment
    pub real_sql: &'a str,
    pub state: &'a SessionState,
    pub directive: &'a HintDirective,
    /// Type of the directive payload when it is itself SQL, else `stmt_type`
    pub hint_stmt_type: StatementType,
    pub strategy: &'a dyn RouteStrategy,
}

impl HintContext<'_> {
    pub fn hint_value(&self) -> &str {
        &self.directive.value
    }
}

/// Produces a route decision for one directive type
pub trait DirectiveHandler: Send + Sync {
    fn route(&self, ctx: &HintContext<'_>) -> Result<Option<RouteDecision>, RouteError>;

    /// Whether the directive payload is a SQL statement to classify and route
    ///
    /// Decisions from such handlers always run on the primary.
    fn payload_is_sql(&self) -> bool {
        false
    }
}

pub type HandlerRegistry = HashMap<&'static str, Arc<dyn DirectiveHandler>>;

/// Routes by the SQL carried in the directive, executes the residual SQL
#[derive(Debug, Default)]
pub struct HintSqlHandler;

impl DirectiveHandler for HintSqlHandler {
    fn route(&self, ctx: &HintContext<'_>) -> Result<Option<RouteDecision>, RouteError> {
        let decision = ctx.strategy.route(
            ctx.schema,
            ctx.hint_stmt_type,
            ctx.hint_value(),
            ctx.state,
            false,
        )?;

        Ok(decision.map(|mut d| {
            d.statement = ctx.real_sql.to_string();
            d.stmt_type = ctx.stmt_type;
            d
        }))
    }

    fn payload_is_sql(&self) -> bool {
        true
    }
}

/// Which side a forwarding directive pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardTarget {
    Master,
    Slave,
    /// Side named by the directive value (`master` or `slave`)
    ByValue,
}

/// Routes the residual SQL normally, then applies a master/slave override
#[derive(Debug)]
pub struct ForwardingHandler {
    target: ForwardTarget,
}

impl ForwardingHandler {
    pub fn new(target: ForwardTarget) -> Self {
        Self { target }
    }

    fn resolve(&self, value: &str) -> Result<ForwardTarget, RouteError> {
        match self.target {
            ForwardTarget::ByValue => match value.to_ascii_lowercase().as_str() {
                "master" => Ok(ForwardTarget::Master),
                "slave" => Ok(ForwardTarget::Slave),
                other => Err(RouteError::UnsupportedDirective(format!("db_type={}", other))),
            },
            target => Ok(target),
        }
    }
}

impl DirectiveHandler for ForwardingHandler {
    fn route(&self, ctx: &HintContext<'_>) -> Result<Option<RouteDecision>, RouteError> {
        let target = self.resolve(ctx.hint_value())?;
        let decision = ctx.strategy.route(
            ctx.schema,
            ctx.stmt_type,
            ctx.real_sql,
            ctx.state,
            false,
        )?;

        Ok(decision.map(|mut d| {
            match target {
                ForwardTarget::Slave => {
                    d.run_on_slave = !ctx.state.in_transaction();
                    d.force_master = false;
                }
                _ => {
                    d.run_on_slave = false;
                    d.force_master = true;
                }
            }
            d
        }))
    }
}

/// Routes the residual SQL to the node named by the directive value
#[derive(Debug, Default)]
pub struct NodeHandler;

impl DirectiveHandler for NodeHandler {
    fn route(&self, ctx: &HintContext<'_>) -> Result<Option<RouteDecision>, RouteError> {
        let schema = ctx.schema.ok_or_else(no_database_selected)?;
        let node = ctx.hint_value();
        if !schema.contains_node(node) {
            return Err(RouteError::sql(
                error_code::ER_PARSE_ERROR,
                "HY000",
                format!("can't find hint sharding node: {}", node),
            ));
        }

        let mut decision = RouteDecision::new(node, ctx.real_sql, ctx.stmt_type);
        decision.run_on_slave =
            RwSplitter::can_use_slave(ctx.stmt_type, ctx.state.in_transaction());
        decision.cacheable = ctx.stmt_type == StatementType::Select;
        Ok(Some(decision))
    }
}

/// Handlers for `/*!<annotation>type=value*/` directives
pub fn structured_handlers() -> HandlerRegistry {
    let mut registry: HandlerRegistry = HashMap::new();
    registry.insert("sql", Arc::new(HintSqlHandler));
    registry.insert("shardingnode", Arc::new(NodeHandler));
    registry.insert("db_type", Arc::new(ForwardingHandler::new(ForwardTarget::ByValue)));
    registry
}

/// Handlers for `/*keyword*/` directives
pub fn keyword_handlers() -> HandlerRegistry {
    let mut registry: HandlerRegistry = HashMap::new();
    registry.insert("master", Arc::new(ForwardingHandler::new(ForwardTarget::Master)));
    registry.insert("slave", Arc::new(ForwardingHandler::new(ForwardTarget::Slave)));
    registry.insert("uproxy_dest", Arc::new(NodeHandler));
    registry
}
