//! Row filters and query description shared by every data backend.
//!
//! A [`Query`] renders to PostgREST parameters (`chat_id=eq.42`,
//! `order=created_at.asc`) for the HTTP backend and evaluates directly
//! against JSON rows for the in-memory backend.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, String),
    Neq(String, String),
    Lt(String, String),
    Gt(String, String),
    /// Case-insensitive match where `*` stands for any run of characters.
    ILike(String, String),
    In(String, Vec<String>),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _)
            | Filter::Neq(column, _)
            | Filter::Lt(column, _)
            | Filter::Gt(column, _)
            | Filter::ILike(column, _)
            | Filter::In(column, _) => column,
        }
    }

    /// Right-hand side in PostgREST operator syntax.
    pub fn operand(&self) -> String {
        match self {
            Filter::Eq(_, value) => format!("eq.{value}"),
            Filter::Neq(_, value) => format!("neq.{value}"),
            Filter::Lt(_, value) => format!("lt.{value}"),
            Filter::Gt(_, value) => format!("gt.{value}"),
            Filter::ILike(_, pattern) => format!("ilike.{pattern}"),
            Filter::In(_, values) => format!("in.({})", values.join(",")),
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        let Some(field) = row.get(self.column()) else {
            return false;
        };
        let text = value_text(field);

        match self {
            Filter::Eq(_, value) => text == *value,
            Filter::Neq(_, value) => text != *value,
            Filter::Lt(_, value) => compare_text(&text, value) == Ordering::Less,
            Filter::Gt(_, value) => compare_text(&text, value) == Ordering::Greater,
            Filter::ILike(_, pattern) => glob_match(&pattern.to_lowercase(), &text.to_lowercase()),
            Filter::In(_, values) => values.iter().any(|value| *value == text),
        }
    }
}

impl fmt::Display for Filter {
    /// Realtime channel filter form, e.g. `chat_id=eq.42`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column(), self.operand())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A select/update/delete target: one table plus filters, ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Column list, including embedded resources such as `*,inviter:profiles(full_name)`.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.to_string()));
        self
    }

    pub fn neq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Neq(column.into(), value.to_string()));
        self
    }

    pub fn lt(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Lt(column.into(), value.to_string()));
        self
    }

    pub fn gt(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Gt(column.into(), value.to_string()));
        self
    }

    pub fn ilike(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike(column.into(), pattern.into()));
        self
    }

    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values = values.into_iter().map(|value| value.to_string()).collect();
        self.filters.push(Filter::In(column.into(), values));
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in PostgREST syntax.
    pub fn to_params(&self, include_select: bool) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 3);

        if include_select {
            params.push(("select".to_string(), self.columns.clone()));
        }

        for filter in &self.filters {
            params.push((filter.column().to_string(), filter.operand()));
        }

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|order| match order.direction {
                    Direction::Ascending => format!("{}.asc", order.column),
                    Direction::Descending => format!("{}.desc", order.column),
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }

    /// Sort rows according to the query's ordering, then apply the limit.
    pub fn arrange(&self, rows: &mut Vec<Value>) {
        if !self.order.is_empty() {
            rows.sort_by(|a, b| {
                for order in &self.order {
                    let left = a.get(&order.column).map(value_text).unwrap_or_default();
                    let right = b.get(&order.column).map(value_text).unwrap_or_default();
                    let ordering = compare_text(&left, &right);
                    let ordering = match order.direction {
                        Direction::Ascending => ordering,
                        Direction::Descending => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare_text(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(left), Ok(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let mut rest = text;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if index == 0 {
            let Some(stripped) = rest.strip_prefix(part) else {
                return false;
            };
            rest = stripped;
        } else if index == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(position) => rest = &rest[position + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_postgrest_parameters() {
        let query = Query::from("messages")
            .eq("chat_id", "abc")
            .order("created_at", Direction::Ascending)
            .limit(50);

        assert_eq!(
            query.to_params(true),
            vec![
                ("select".to_string(), "*".to_string()),
                ("chat_id".to_string(), "eq.abc".to_string()),
                ("order".to_string(), "created_at.asc".to_string()),
                ("limit".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn realtime_filter_form() {
        let filter = Filter::Eq("chat_id".into(), "42".into());
        assert_eq!(filter.to_string(), "chat_id=eq.42");
    }

    #[test]
    fn matches_rows_by_text_value() {
        let row = json!({"id": 7, "status": "available", "title": "Vintage Camera"});

        assert!(Query::from("items").eq("id", 7).matches(&row));
        assert!(Query::from("items").neq("status", "sold").matches(&row));
        assert!(Query::from("items").ilike("title", "*camera*").matches(&row));
        assert!(Query::from("items").in_list("status", ["available", "pending"]).matches(&row));
        assert!(!Query::from("items").eq("missing", 1).matches(&row));
    }

    #[test]
    fn numeric_comparisons_do_not_use_lexical_order() {
        let row = json!({"views": 10});
        assert!(Query::from("items").gt("views", 9).matches(&row));
        assert!(!Query::from("items").lt("views", 9).matches(&row));
    }

    #[test]
    fn arrange_sorts_descending_and_truncates() {
        let mut rows = vec![
            json!({"created_at": "2024-01-01T00:00:00Z"}),
            json!({"created_at": "2024-03-01T00:00:00Z"}),
            json!({"created_at": "2024-02-01T00:00:00Z"}),
        ];
        Query::from("items")
            .order("created_at", Direction::Descending)
            .limit(2)
            .arrange(&mut rows);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["created_at"], "2024-03-01T00:00:00Z");
        assert_eq!(rows[1]["created_at"], "2024-02-01T00:00:00Z");
    }

    #[test]
    fn glob_handles_prefix_and_suffix() {
        assert!(glob_match("cam*", "camera"));
        assert!(glob_match("*era", "camera"));
        assert!(!glob_match("cam*x", "camera"));
        assert!(glob_match("exact", "exact"));
    }
}
