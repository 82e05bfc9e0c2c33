//! Query description shared by every `RemoteClient` implementation.
//!
//! A `Query` names a table, a set of filters, an ordering, and an optional
//! offset window. The REST client renders it as PostgREST query parameters;
//! the in-memory client evaluates it directly against stored rows.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-insensitive pattern match, `%` is the wildcard.
    ILike,
}

impl FilterOp {
    fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::ILike => "ilike",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    fn operand(&self) -> String {
        let raw = match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        };
        match self.op {
            // PostgREST accepts `*` in place of `%` inside URLs
            FilterOp::ILike => raw.replace('%', "*"),
            _ => raw,
        }
    }

    /// Render the right-hand side of a PostgREST filter (`eq.true`, `ilike.*foo*`).
    fn render_value(&self) -> String {
        format!("{}.{}", self.op.as_str(), self.operand())
    }

    /// Render as one element of an `or=(...)` list, quoting reserved characters.
    fn render_in_list(&self) -> String {
        format!("{}.{}.{}", self.column, self.op.as_str(), quote_list_value(&self.operand()))
    }

    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => values_equal(field, &self.value),
            FilterOp::Neq => !values_equal(field, &self.value),
            FilterOp::Gt => compare_values(field, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare_values(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare_values(field, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare_values(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::ILike => match (field.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => ilike(text, pattern),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Where(Condition),
    /// Matches when any of the conditions matches.
    AnyOf(Vec<Condition>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Where(Condition::new(column, FilterOp::Eq, value))
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Where(Condition::new(column, FilterOp::Neq, value))
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Where(Condition::new(column, FilterOp::Gte, value))
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Where(Condition::new(column, FilterOp::Lte, value))
    }

    /// Case-insensitive substring search over several columns.
    pub fn search(columns: &[&str], term: &str) -> Self {
        let pattern = format!("%{}%", term);
        Filter::AnyOf(
            columns
                .iter()
                .map(|c| Condition::new(*c, FilterOp::ILike, pattern.clone()))
                .collect(),
        )
    }

    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Where(cond) => cond.matches(row),
            Filter::AnyOf(conds) => conds.iter().any(|c| c.matches(row)),
        }
    }

    /// Render as a `(key, value)` PostgREST query parameter.
    pub fn to_param(&self) -> (String, String) {
        match self {
            Filter::Where(cond) => (cond.column.clone(), cond.render_value()),
            Filter::AnyOf(conds) => {
                let parts: Vec<String> = conds
                    .iter()
                    .map(Condition::render_in_list)
                    .collect();
                ("or".to_string(), format!("({})", parts.join(",")))
            }
        }
    }
}

/// Values inside `or=(...)` that contain list syntax must be double-quoted,
/// with `"` and `\` backslash-escaped.
fn quote_list_value(value: &str) -> String {
    let reserved = |c: char| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace();
    if !value.chars().any(reserved) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub range: Option<Range>,
    /// Ask the backend for the exact number of matching rows.
    pub count: bool,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            count: false,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction: Direction::Asc,
        });
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction: Direction::Desc,
        });
        self
    }

    pub fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// PostgREST query parameters, excluding the table which goes in the path.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(self.filters.iter().map(Filter::to_param));

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    let dir = match o.direction {
                        Direction::Asc => "asc",
                        Direction::Desc => "desc",
                    };
                    format!("{}.{}", o.column, dir)
                })
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }

        if let Some(range) = self.range {
            params.push(("offset".to_string(), range.offset.to_string()));
            params.push(("limit".to_string(), range.limit.to_string()));
        }

        params
    }

    /// Compare two rows under this query's ordering.
    pub fn compare_rows(&self, a: &Value, b: &Value) -> Ordering {
        for order in &self.order {
            let left = a.get(&order.column).unwrap_or(&Value::Null);
            let right = b.get(&order.column).unwrap_or(&Value::Null);
            let ord = compare_values(left, right).unwrap_or(Ordering::Equal);
            let ord = match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// One page of rows, plus the total match count when the backend reported it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: Option<usize>,
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Nulls sort last, matching the backend's default for ascending order.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Greater),
        (_, Value::Null) => Some(Ordering::Less),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn ilike(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();

    if parts.len() == 1 {
        return text == pattern;
    }

    let mut rest = text.as_str();
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}
