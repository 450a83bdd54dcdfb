//! Grouped (aggregating) paginated queries.
//!
//! # Responsibility
//! - Optionally unwind one embedded array per document (e.g. `visits`).
//! - Group on a tuple of document- and item-level fields, projecting each key
//!   under an alias plus a `count`.
//! - Apply the page contract (offset/limit/order/prefix/total) over groups.
//!
//! # Invariants
//! - Source rows whose `required` keys are null are dropped before grouping.
//!   Visit history requires `date`.
//! - Group order is total: ties break on every key in the requested direction.

use super::error::{SessionError, SessionResult};
use super::fields::{check_alias, json_path, like_prefix_pattern};
use super::query::{PageQuery, QueryResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;

/// Alias under which group sizes are projected.
pub const COUNT_ALIAS: &str = "count";

/// Where a grouping key is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Field of the owning document.
    Document,
    /// Field of the unwound array element.
    Item,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub source: KeySource,
    pub field: String,
    pub alias: String,
}

/// Grouping description; combine with a [`PageQuery`] whose order field is
/// an alias or [`COUNT_ALIAS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    pub collection: String,
    pub unwind: Option<String>,
    pub keys: Vec<GroupKey>,
    pub required: Vec<String>,
    pub search_keys: Vec<String>,
}

impl GroupQuery {
    pub fn over(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            unwind: None,
            keys: Vec::new(),
            required: Vec::new(),
            search_keys: Vec::new(),
        }
    }

    /// Emits one source row per element of the array at `field`.
    pub fn unwind(mut self, field: impl Into<String>) -> Self {
        self.unwind = Some(field.into());
        self
    }

    pub fn key(mut self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.keys.push(GroupKey {
            source: KeySource::Document,
            field: field.into(),
            alias: alias.into(),
        });
        self
    }

    pub fn item_key(mut self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.keys.push(GroupKey {
            source: KeySource::Item,
            field: field.into(),
            alias: alias.into(),
        });
        self
    }

    /// Drops source rows where `alias` is null.
    pub fn require(mut self, alias: impl Into<String>) -> Self {
        self.required.push(alias.into());
        self
    }

    /// Adds `alias` to the keys matched by the page's prefix term.
    pub fn searching(mut self, alias: impl Into<String>) -> Self {
        self.search_keys.push(alias.into());
        self
    }

    fn validate(&self) -> SessionResult<()> {
        if self.keys.is_empty() {
            return Err(SessionError::InvalidField(
                "group query needs at least one key".to_string(),
            ));
        }
        if let Some(unwind) = &self.unwind {
            json_path(unwind)?;
        }

        let mut seen = HashSet::new();
        for key in &self.keys {
            json_path(&key.field)?;
            check_alias(&key.alias)?;
            if key.alias == COUNT_ALIAS || !seen.insert(key.alias.as_str()) {
                return Err(SessionError::InvalidField(key.alias.clone()));
            }
            if key.source == KeySource::Item && self.unwind.is_none() {
                return Err(SessionError::InvalidField(format!(
                    "{} (item key without unwound array)",
                    key.field
                )));
            }
        }

        for alias in self.required.iter().chain(&self.search_keys) {
            self.column_of(alias)?;
        }
        Ok(())
    }

    fn column_of(&self, alias: &str) -> SessionResult<String> {
        if alias == COUNT_ALIAS {
            return Ok("group_count".to_string());
        }
        self.keys
            .iter()
            .position(|key| key.alias == alias)
            .map(|index| format!("k{index}"))
            .ok_or_else(|| SessionError::InvalidField(alias.to_string()))
    }
}

/// Runs `group` under `page` and decodes each group into `R`.
///
/// Each row is decoded from a JSON object holding every alias plus `count`.
pub(crate) fn run_grouped<R: DeserializeOwned>(
    conn: &Connection,
    group: &GroupQuery,
    page: &PageQuery,
) -> SessionResult<QueryResult<R>> {
    page.validate()?;
    group.validate()?;

    let mut bind_values: Vec<Value> = Vec::new();
    let key_columns = (0..group.keys.len())
        .map(|index| format!("k{index}"))
        .collect::<Vec<_>>();
    // `json_extract` folds JSON booleans into 1/0; the type column keeps them apart.
    let type_columns = (0..group.keys.len())
        .map(|index| format!("t{index}"))
        .collect::<Vec<_>>();

    let mut projections = Vec::with_capacity(group.keys.len() * 2);
    for ((key, column), type_column) in group.keys.iter().zip(&key_columns).zip(&type_columns) {
        let source = match key.source {
            KeySource::Document => "d.body",
            KeySource::Item => "item.value",
        };
        let path = json_path(&key.field)?;
        projections.push(format!(
            "json_extract({source}, ?) AS {column}, json_type({source}, ?) AS {type_column}"
        ));
        bind_values.push(Value::Text(path.clone()));
        bind_values.push(Value::Text(path));
    }

    let mut from_sql = String::from("documents d");
    if let Some(unwind) = &group.unwind {
        from_sql.push_str(", json_each(d.body, ?) item");
        bind_values.push(Value::Text(json_path(unwind)?));
    }
    bind_values.push(Value::Text(group.collection.clone()));

    let mut required_sql = String::new();
    for (index, alias) in group.required.iter().enumerate() {
        let keyword = if index == 0 { " WHERE" } else { " AND" };
        required_sql.push_str(&format!("{keyword} {} IS NOT NULL", group.column_of(alias)?));
    }

    let columns = key_columns.join(", ");
    let typed_columns = format!("{columns}, {}", type_columns.join(", "));
    let cte = format!(
        "WITH source AS (
            SELECT {}
            FROM {from_sql}
            WHERE d.collection = ?
        ), groups AS (
            SELECT {typed_columns}, COUNT(*) AS group_count
            FROM source{required_sql}
            GROUP BY {typed_columns}
        )",
        projections.join(", ")
    );

    let mut filter_sql = String::new();
    if let Some(term) = page.search_term() {
        if !group.search_keys.is_empty() {
            let pattern = like_prefix_pattern(&term);
            let mut clauses = Vec::with_capacity(group.search_keys.len());
            for alias in &group.search_keys {
                clauses.push(format!("{} LIKE ? ESCAPE '\\'", group.column_of(alias)?));
                bind_values.push(Value::Text(pattern.clone()));
            }
            filter_sql = format!(" WHERE ({})", clauses.join(" OR "));
        }
    }

    let order_sql = match &page.order {
        Some(order) => {
            let direction = order.direction.sql();
            let primary = group.column_of(&order.field)?;
            let mut terms = vec![format!("{primary} {direction}")];
            terms.extend(
                key_columns
                    .iter()
                    .chain(&type_columns)
                    .filter(|column| **column != primary)
                    .map(|column| format!("{column} {direction}")),
            );
            terms.join(", ")
        }
        None => key_columns
            .iter()
            .chain(&type_columns)
            .map(|column| format!("{column} ASC"))
            .collect::<Vec<_>>()
            .join(", "),
    };

    let count_sql = format!("{cte} SELECT COUNT(*) FROM groups{filter_sql}");
    let page_sql = format!(
        "{cte} SELECT {typed_columns}, group_count FROM groups{filter_sql} ORDER BY {order_sql} LIMIT ? OFFSET ?"
    );
    let mut page_values = bind_values.clone();
    page_values.push(Value::Integer(i64::from(page.limit)));
    page_values.push(Value::Integer(i64::from(page.offset)));

    let tx = conn.unchecked_transaction()?;
    let total: i64 = tx.query_row(&count_sql, params_from_iter(bind_values.iter()), |row| {
        row.get(0)
    })?;

    let mut rows = Vec::new();
    {
        let mut stmt = tx.prepare(&page_sql)?;
        let mut cursor = stmt.query(params_from_iter(page_values.iter()))?;
        while let Some(row) = cursor.next()? {
            let mut object = Map::new();
            let width = group.keys.len();
            for (index, key) in group.keys.iter().enumerate() {
                let json_type: Option<String> = row.get(width + index)?;
                object.insert(
                    key.alias.clone(),
                    sql_to_json(row.get(index)?, json_type.as_deref())?,
                );
            }
            let count: i64 = row.get(width * 2)?;
            object.insert(COUNT_ALIAS.to_string(), JsonValue::from(count));
            let decoded = serde_json::from_value::<R>(JsonValue::Object(object))
                .map_err(|err| SessionError::InvalidData(format!("grouped row: {err}")))?;
            rows.push(decoded);
        }
    }
    tx.commit()?;

    Ok(QueryResult {
        rows,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

/// Converts one extracted key back to JSON using the `json_type` it was read with.
fn sql_to_json(value: Value, json_type: Option<&str>) -> SessionResult<JsonValue> {
    match (value, json_type) {
        (Value::Integer(number), Some("true" | "false")) => Ok(JsonValue::Bool(number != 0)),
        (Value::Text(text), Some("object" | "array")) => serde_json::from_str(&text)
            .map_err(|err| SessionError::InvalidData(format!("grouping key: {err}"))),
        (value, _) => scalar_to_json(value),
    }
}

fn scalar_to_json(value: Value) -> SessionResult<JsonValue> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Integer(number) => Ok(JsonValue::from(number)),
        Value::Real(number) => Ok(serde_json::Number::from_f64(number)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)),
        Value::Text(text) => Ok(JsonValue::String(text)),
        Value::Blob(_) => Err(SessionError::InvalidData(
            "binary value in grouping key".to_string(),
        )),
    }
}
