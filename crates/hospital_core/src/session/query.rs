//! Paginated collection queries.
//!
//! # Responsibility
//! - Describe one page request (offset/limit/order/prefix term).
//! - Read a page and the filtered total from a single read snapshot.
//!
//! # Invariants
//! - `limit > 0`; `rows.len() <= limit`; `total >= rows.len()`.
//! - `total` honours the filter and ignores offset/limit.
//! - Ties in the order field break on id in the same direction, so flipping
//!   the direction reverses the sequence exactly.

use super::error::{SessionError, SessionResult};
use super::fields::{json_path, like_prefix_pattern, normalize_search_term};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// Page descriptor for list and search views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub offset: u32,
    pub limit: u32,
    /// `None` keeps the store's natural order.
    pub order: Option<OrderBy>,
    /// Prefix term; see [`normalize_search_term`] for the minimum length.
    pub term: Option<String>,
}

impl PageQuery {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit,
            order: None,
            term: None,
        }
    }

    /// Single-row page, used for singleton documents.
    pub fn first() -> Self {
        Self::new(0, 1)
    }

    pub fn ordered_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_order(mut self, order: Option<OrderBy>) -> Self {
        self.order = order;
        self
    }

    pub fn matching(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.limit == 0 {
            return Err(SessionError::InvalidPage(
                "limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective filter term, `None` when absent or too short.
    pub fn search_term(&self) -> Option<String> {
        self.term.as_deref().and_then(normalize_search_term)
    }
}

/// One page of rows plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub rows: Vec<T>,
    pub total: u64,
}

impl<T> QueryResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> QueryResult<U> {
        QueryResult {
            rows: self.rows.into_iter().map(f).collect(),
            total: self.total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Raw stored document as read by the runner.
#[derive(Debug, Clone)]
pub(crate) struct StoredDocument {
    pub id: String,
    pub body: String,
    pub revision: i64,
}

/// Reads one page of `collection` plus its filtered total.
pub(crate) fn run_page(
    conn: &Connection,
    collection: &str,
    search_fields: &[&str],
    page: &PageQuery,
) -> SessionResult<QueryResult<StoredDocument>> {
    page.validate()?;

    let mut where_sql = String::from(" WHERE collection = ?");
    let mut bind_values: Vec<Value> = vec![Value::Text(collection.to_string())];

    if let Some(term) = page.search_term() {
        if !search_fields.is_empty() {
            let pattern = like_prefix_pattern(&term);
            let mut clauses = Vec::with_capacity(search_fields.len());
            for field in search_fields {
                clauses.push("json_extract(body, ?) LIKE ? ESCAPE '\\'");
                bind_values.push(Value::Text(json_path(field)?));
                bind_values.push(Value::Text(pattern.clone()));
            }
            where_sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }
    }

    let mut page_sql = format!("SELECT id, body, revision FROM documents{where_sql}");
    let mut page_values = bind_values.clone();
    match &page.order {
        Some(order) => {
            let direction = order.direction.sql();
            page_sql.push_str(&format!(
                " ORDER BY json_extract(body, ?) {direction}, id {direction}"
            ));
            page_values.push(Value::Text(json_path(&order.field)?));
        }
        None => page_sql.push_str(" ORDER BY id ASC"),
    }
    page_sql.push_str(" LIMIT ? OFFSET ?");
    page_values.push(Value::Integer(i64::from(page.limit)));
    page_values.push(Value::Integer(i64::from(page.offset)));

    // Count and page come from the same snapshot.
    let tx = conn.unchecked_transaction()?;
    let total: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM documents{where_sql}"),
        params_from_iter(bind_values.iter()),
        |row| row.get(0),
    )?;

    let mut rows = Vec::new();
    {
        let mut stmt = tx.prepare(&page_sql)?;
        let mut cursor = stmt.query(params_from_iter(page_values.iter()))?;
        while let Some(row) = cursor.next()? {
            rows.push(StoredDocument {
                id: row.get("id")?,
                body: row.get("body")?,
                revision: row.get("revision")?,
            });
        }
    }
    tx.commit()?;

    Ok(QueryResult {
        rows,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::{Direction, OrderBy, PageQuery, QueryResult};
    use crate::session::error::SessionError;

    #[test]
    fn zero_limit_is_rejected() {
        let err = PageQuery::new(0, 0).validate().unwrap_err();
        assert!(matches!(err, SessionError::InvalidPage(_)));
    }

    #[test]
    fn single_character_term_does_not_filter() {
        assert_eq!(PageQuery::new(0, 5).matching("a").search_term(), None);
        assert_eq!(
            PageQuery::new(0, 5).matching("an").search_term().as_deref(),
            Some("an")
        );
    }

    #[test]
    fn direction_reverses() {
        assert_eq!(Direction::Ascending.reversed(), Direction::Descending);
        assert_eq!(
            OrderBy::descending("date").direction.reversed(),
            Direction::Ascending
        );
    }

    #[test]
    fn map_keeps_total() {
        let result = QueryResult {
            rows: vec![1, 2],
            total: 7,
        };
        let mapped = result.map(|value| value * 10);
        assert_eq!(mapped.rows, vec![10, 20]);
        assert_eq!(mapped.total, 7);
    }
}
