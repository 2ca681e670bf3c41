//! Lexical read/write classification of SQL text.
//!
//! Only the first whitespace-delimited token is inspected. Statements that mutate
//! through any other verb (`REPLACE`, `WITH ... INSERT`, `PRAGMA`, ...) are reported
//! as reads and therefore do not invalidate subscribers.

/// Leading verbs treated as writes.
pub const WRITE_VERBS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE",
];

/// Read or write, as far as invalidation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        let verb = sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase();

        if WRITE_VERBS.contains(&verb.as_str()) {
            StatementKind::Write
        } else {
            StatementKind::Read
        }
    }

    pub fn is_write(self) -> bool {
        self == StatementKind::Write
    }
}
