use crate::config::SchemaConfig;
use crate::parser::StatementType;
use crate::protocol::error_code;
use crate::session::SessionState;

use super::decision::RouteDecision;
use super::error::RouteError;
use super::rw_split::RwSplitter;

/// Routing for statements without a directive
pub trait RouteStrategy: Send + Sync {
    fn route(
        &self,
        schema: Option<&SchemaConfig>,
        stmt_type: StatementType,
        sql: &str,
        state: &SessionState,
        is_explain: bool,
    ) -> Result<Option<RouteDecision>, RouteError>;
}

/// Error returned when a statement needs a schema and none is selected
pub(crate) fn no_database_selected() -> RouteError {
    RouteError::sql(error_code::ER_NO_DB_ERROR, "3D000", "No database selected")
}

/// Sends every statement to the schema's default node
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRouteStrategy;

impl RouteStrategy for DefaultRouteStrategy {
    fn route(
        &self,
        schema: Option<&SchemaConfig>,
        stmt_type: StatementType,
        sql: &str,
        state: &SessionState,
        is_explain: bool,
    ) -> Result<Option<RouteDecision>, RouteError> {
        let schema = schema.ok_or_else(no_database_selected)?;

        let mut decision = RouteDecision::new(&schema.default_node, sql, stmt_type);
        decision.run_on_slave = RwSplitter::can_use_slave(stmt_type, state.in_transaction());
        decision.cacheable = stmt_type == StatementType::Select && !is_explain;
        Ok(Some(decision))
    }
}
