//! Dynamic WHERE clauses for grid queries
//!
//! `SqlFilter` collects `AND`-joined predicates with `?` placeholders and the
//! values to bind, in order. Column names always come from code, never from
//! the request; user input only ever reaches the database as a bound value.
//!
//! Text search is rendered per dialect. SQLite's `LIKE` and `LOWER()` only
//! fold ASCII, so SQLite matches with `REGEXP` (registered on every
//! connection, Unicode case folding). MySQL uses `LIKE` under the table's
//! case-insensitive collation.

use crate::config::DatabaseDriver;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;
pub type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// A typed value waiting to be bound to a placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(value.to_string())
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(value)
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Int(value)
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for BindValue {
    fn from(value: DateTime<Utc>) -> Self {
        BindValue::Time(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Raw { sql: String, binds: Vec<BindValue> },
    Search { columns: Vec<String>, term: String },
}

#[derive(Debug, Clone, Default)]
pub struct SqlFilter {
    predicates: Vec<Predicate>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw predicate. `binds` must match its placeholders in order.
    pub fn push(
        &mut self,
        clause: impl Into<String>,
        binds: impl IntoIterator<Item = BindValue>,
    ) -> &mut Self {
        self.predicates.push(Predicate::Raw {
            sql: clause.into(),
            binds: binds.into_iter().collect(),
        });
        self
    }

    pub fn eq(&mut self, column: &str, value: impl Into<BindValue>) -> &mut Self {
        self.push(format!("{} = ?", column), [value.into()])
    }

    /// `eq` when a value is present, no-op otherwise
    pub fn eq_opt<V: Into<BindValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    /// Case-insensitive substring match across `columns`
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => term,
            None => return self,
        };
        if columns.is_empty() {
            return self;
        }

        self.predicates.push(Predicate::Search {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            term: term.to_string(),
        });
        self
    }

    /// ` WHERE ...` for `driver`, or an empty string
    pub fn where_sql(&self, driver: DatabaseDriver) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        let clauses = self
            .predicates
            .iter()
            .map(|predicate| match predicate {
                Predicate::Raw { sql, .. } => sql.clone(),
                Predicate::Search { columns, .. } => {
                    let matcher = match driver {
                        DatabaseDriver::Sqlite => "COALESCE({}, '') REGEXP ?",
                        DatabaseDriver::Mysql => "{} LIKE ? ESCAPE '!'",
                    };
                    let any = columns
                        .iter()
                        .map(|column| matcher.replace("{}", column))
                        .collect::<Vec<_>>()
                        .join(" OR ");
                    format!("({})", any)
                }
            })
            .collect::<Vec<_>>();
        format!(" WHERE {}", clauses.join(" AND "))
    }

    /// Values for the placeholders of `where_sql(driver)`, in order
    pub fn binds(&self, driver: DatabaseDriver) -> Vec<BindValue> {
        let mut binds = Vec::new();
        for predicate in &self.predicates {
            match predicate {
                Predicate::Raw { binds: values, .. } => binds.extend(values.iter().cloned()),
                Predicate::Search { columns, term } => {
                    let pattern = match driver {
                        DatabaseDriver::Sqlite => regex_pattern(term),
                        DatabaseDriver::Mysql => like_pattern(term),
                    };
                    binds.extend(columns.iter().map(|_| BindValue::Text(pattern.clone())));
                }
            }
        }
        binds
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Case-insensitive literal match for SQLite's `REGEXP`
pub fn regex_pattern(term: &str) -> String {
    format!("(?i){}", regex::escape(term))
}

/// `%term%` with LIKE wildcards in the term escaped by `!`
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn bind_sqlite<'q>(mut query: SqliteQuery<'q>, binds: &[BindValue]) -> SqliteQuery<'q> {
    for value in binds {
        query = match value {
            BindValue::Text(v) => query.bind(v.clone()),
            BindValue::Int(v) => query.bind(*v),
            BindValue::Bool(v) => query.bind(*v),
            BindValue::Time(v) => query.bind(*v),
        };
    }
    query
}

pub fn bind_mysql<'q>(mut query: MySqlQuery<'q>, binds: &[BindValue]) -> MySqlQuery<'q> {
    for value in binds {
        query = match value {
            BindValue::Text(v) => query.bind(v.clone()),
            BindValue::Int(v) => query.bind(*v),
            BindValue::Bool(v) => query.bind(*v),
            BindValue::Time(v) => query.bind(*v),
        };
    }
    query
}
