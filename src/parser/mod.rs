mod analyzer;

pub use analyzer::{SqlAnalyzer, StatementType};
