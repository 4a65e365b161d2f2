use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

/// Type of SQL statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Replace,
    Begin,
    Commit,
    Rollback,
    Set,
    Show,
    Use,
    Explain,
    Lock,
    Unlock,
    LoadData,
    Other,
}

impl StatementType {
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            StatementType::Select | StatementType::Show | StatementType::Explain
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Select => "select",
            StatementType::Insert => "insert",
            StatementType::Update => "update",
            StatementType::Delete => "delete",
            StatementType::Replace => "replace",
            StatementType::Begin => "begin",
            StatementType::Commit => "commit",
            StatementType::Rollback => "rollback",
            StatementType::Set => "set",
            StatementType::Show => "show",
            StatementType::Use => "use",
            StatementType::Explain => "explain",
            StatementType::Lock => "lock",
            StatementType::Unlock => "unlock",
            StatementType::LoadData => "load_data",
            StatementType::Other => "other",
        }
    }
}

/// Keyword prefixes resolved without a full parse, checked in order
const PREFIX_TYPES: &[(&str, StatementType)] = &[
    ("START TRANSACTION", StatementType::Begin),
    ("BEGIN", StatementType::Begin),
    ("COMMIT", StatementType::Commit),
    ("ROLLBACK", StatementType::Rollback),
    ("LOAD DATA", StatementType::LoadData),
    ("LOCK TABLES", StatementType::Lock),
    ("LOCK TABLE", StatementType::Lock),
    ("UNLOCK TABLES", StatementType::Unlock),
    ("UNLOCK TABLE", StatementType::Unlock),
    ("EXPLAIN", StatementType::Explain),
    ("DESCRIBE", StatementType::Explain),
    ("DESC ", StatementType::Explain),
    ("REPLACE", StatementType::Replace),
    ("SHOW", StatementType::Show),
    ("SET", StatementType::Set),
    ("USE", StatementType::Use),
];

/// Statement classifier
///
/// Assigns a [`StatementType`] to raw SQL. Transaction control and a few
/// MySQL-only statements are recognised by keyword; everything else goes
/// through `sqlparser` with the MySQL dialect. Text the parser rejects is
/// classified from its leading keyword instead of failing, since routing must
/// still happen for statements the parser does not understand.
pub struct SqlAnalyzer {
    dialect: MySqlDialect,
}

impl SqlAnalyzer {
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Classify a SQL statement
    pub fn classify(&self, sql: &str) -> StatementType {
        let sql = skip_leading_comments(sql);
        if sql.is_empty() {
            return StatementType::Other;
        }

        if let Some(stmt_type) = classify_prefix(sql) {
            return stmt_type;
        }

        match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements
                .first()
                .map(classify_statement)
                .unwrap_or(StatementType::Other),
            Err(e) => {
                debug!(error = %e, "Falling back to keyword classification");
                classify_keyword(sql)
            }
        }
    }

    /// Whether the statement is an `EXPLAIN`/`DESCRIBE` of another statement
    pub fn is_explain(&self, sql: &str) -> bool {
        classify_prefix(skip_leading_comments(sql)) == Some(StatementType::Explain)
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_statement(stmt: &Statement) -> StatementType {
    match stmt {
        Statement::Query(_) => StatementType::Select,
        Statement::Insert { .. } => StatementType::Insert,
        Statement::Update { .. } => StatementType::Update,
        Statement::Delete { .. } => StatementType::Delete,
        Statement::StartTransaction { .. } => StatementType::Begin,
        Statement::Commit { .. } => StatementType::Commit,
        Statement::Rollback { .. } => StatementType::Rollback,
        Statement::SetVariable { .. } | Statement::SetNames { .. } => StatementType::Set,
        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowCreate { .. } => StatementType::Show,
        Statement::Use { .. } => StatementType::Use,
        Statement::Explain { .. } | Statement::ExplainTable { .. } => StatementType::Explain,
        _ => StatementType::Other,
    }
}

fn classify_prefix(sql: &str) -> Option<StatementType> {
    PREFIX_TYPES
        .iter()
        .find(|(prefix, _)| starts_with_keyword(sql, prefix))
        .map(|(_, stmt_type)| *stmt_type)
}

fn classify_keyword(sql: &str) -> StatementType {
    let keyword: String = sql
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" | "WITH" => StatementType::Select,
        "INSERT" => StatementType::Insert,
        "UPDATE" => StatementType::Update,
        "DELETE" => StatementType::Delete,
        _ => StatementType::Other,
    }
}

/// Case-insensitive keyword prefix check that requires a word boundary
fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let bytes = sql.as_bytes();
    let kw = keyword.as_bytes();
    if bytes.len() < kw.len() || !bytes[..kw.len()].eq_ignore_ascii_case(kw) {
        return false;
    }
    match bytes.get(kw.len()) {
        None => true,
        Some(b) => (!b.is_ascii_alphanumeric() && *b != b'_') || kw.ends_with(b" "),
    }
}

/// Skip whitespace and leading `/* ... */` comments (routing directives)
fn skip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    while let Some(body) = rest.strip_prefix("/*") {
        match body.find("*/") {
            Some(end) => rest = body[end + 2..].trim_start(),
            None => break,
        }
    }
    rest.trim_end()
}
