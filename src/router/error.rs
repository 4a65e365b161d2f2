use thiserror::Error;

/// Errors raised while producing a route decision
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Directive present but its value is empty
    #[error(
        "comment in sql must meet :/*!{annotation}type=value*/ or /*#{annotation}type=value*/ \
         or /*{annotation}type=value*/: {statement}"
    )]
    MalformedDirective {
        annotation: String,
        statement: String,
    },

    /// Directive type has no registered handler
    #[error("Not supported hint sql type : {0}")]
    UnsupportedDirective(String),

    /// Statement-level error from a route strategy or directive handler
    #[error("{}", .message.as_deref().unwrap_or("routing failed"))]
    Sql {
        code: u16,
        state: Option<String>,
        message: Option<String>,
    },
}

impl RouteError {
    pub fn sql(code: u16, state: &str, message: impl Into<String>) -> Self {
        RouteError::Sql {
            code,
            state: Some(state.to_string()),
            message: Some(message.into()),
        }
    }

    /// MySQL vendor error code; 0 when the error carries none
    pub fn vendor_code(&self) -> u16 {
        match self {
            RouteError::Sql { code, .. } => *code,
            _ => 0,
        }
    }

    /// SQL state, when the error carries one
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            RouteError::Sql { state, .. } => state.as_deref(),
            _ => None,
        }
    }

    /// Human-readable message, when the error carries one
    pub fn message(&self) -> Option<String> {
        match self {
            RouteError::Sql { message, .. } => message.clone(),
            other => Some(other.to_string()),
        }
    }

    /// Stable name of the error kind, used in logs and metrics
    pub fn kind_name(&self) -> &'static str {
        match self {
            RouteError::MalformedDirective { .. } => "MalformedDirective",
            RouteError::UnsupportedDirective(_) => "UnsupportedDirective",
            RouteError::Sql { .. } => "SqlError",
        }
    }
}
