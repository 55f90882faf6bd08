//! Filter expressions - building, serializing, parsing and evaluating
//! MongoDB-style `where` predicates.
//!
//! The client builds expressions with [`range_filter`], [`substring_filter`]
//! and [`combine`], then sends [`serialize`]d text as the `where` query
//! parameter. The server [`parse`]s it back, and the in-memory store
//! evaluates it with [`FilterExpr::matches`].
//!
//! # Wire format
//!
//! | Expression | Serialized |
//! |------------|------------|
//! | `band_gap > 0.0` | `{"band_gap":{"$gt":0.0}}` |
//! | `formula contains "Ga"` | `{"formula":{"$regex":"Ga"}}` |
//! | `e1 AND e2` | `{"$and":[e1,e2]}` |

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{EmptyFilterWarning, FilterError};
use crate::types::json_type_name;

/// Logical conjunction key.
pub const AND: &str = "$and";

/// Comparison operators understood by the filter layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
    Regex,
    In,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Regex => "$regex",
            Operator::In => "$in",
        }
    }

    /// Parse an operator key (including the leading `$`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$eq" => Some(Operator::Eq),
            "$ne" => Some(Operator::Ne),
            "$regex" => Some(Operator::Regex),
            "$in" => Some(Operator::In),
            _ => None,
        }
    }
}

/// An immutable predicate over record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `field <op> value`.
    Compare {
        field: String,
        op: Operator,
        value: Value,
    },
    /// All sub-expressions must hold. Order is kept as built.
    And(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        FilterExpr::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Render as a MongoDB-style JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            FilterExpr::Compare { field, op, value } => {
                let mut inner = Map::new();
                inner.insert(op.as_str().to_string(), value.clone());
                let mut outer = Map::new();
                outer.insert(field.clone(), Value::Object(inner));
                Value::Object(outer)
            }
            // `{}` matches everything; an empty `$and` array is rejected by
            // the document store
            FilterExpr::And(exprs) if exprs.is_empty() => Value::Object(Map::new()),
            FilterExpr::And(exprs) => {
                let mut outer = Map::new();
                outer.insert(
                    AND.to_string(),
                    Value::Array(exprs.iter().map(FilterExpr::to_value).collect()),
                );
                Value::Object(outer)
            }
        }
    }

    /// Decode a MongoDB-style JSON value.
    ///
    /// Accepts explicit operators (`{"f":{"$gt":1}}`), implicit equality
    /// (`{"f":"x"}`) and several keys in one object (implicit AND).
    ///
    /// # Errors
    ///
    /// Returns `FilterError` for non-object filters, operators present in
    /// `blacklist`, unknown operators, or operands of the wrong shape.
    pub fn from_value(value: &Value, blacklist: &[String]) -> Result<Self, FilterError> {
        parse_object(value, blacklist, "")
    }

    /// Whether a JSON document satisfies this predicate.
    ///
    /// Prepares the expression on each call; use [`matcher`](Self::matcher)
    /// to test many documents.
    pub fn matches(&self, document: &Value) -> bool {
        self.matcher().matches(document)
    }

    /// Prepare the expression for repeated evaluation, compiling every
    /// `$regex` pattern once.
    pub fn matcher(&self) -> Matcher<'_> {
        Matcher {
            node: Node::prepare(self),
        }
    }
}

/// A [`FilterExpr`] ready to be evaluated against many documents.
#[derive(Debug)]
pub struct Matcher<'a> {
    node: Node<'a>,
}

impl Matcher<'_> {
    pub fn matches(&self, document: &Value) -> bool {
        self.node.matches(document)
    }
}

#[derive(Debug)]
enum Node<'a> {
    All(Vec<Node<'a>>),
    Compare {
        field: &'a str,
        op: Operator,
        value: &'a Value,
        /// Compiled pattern for `$regex`; `None` if the pattern is invalid.
        regex: Option<Regex>,
    },
}

impl<'a> Node<'a> {
    fn prepare(expr: &'a FilterExpr) -> Self {
        match expr {
            FilterExpr::And(exprs) => Node::All(exprs.iter().map(Node::prepare).collect()),
            FilterExpr::Compare { field, op, value } => Node::Compare {
                field,
                op: *op,
                value,
                regex: match op {
                    Operator::Regex => value.as_str().and_then(|p| Regex::new(p).ok()),
                    _ => None,
                },
            },
        }
    }

    fn matches(&self, document: &Value) -> bool {
        match self {
            Node::All(nodes) => nodes.iter().all(|n| n.matches(document)),
            Node::Compare {
                field,
                op,
                value,
                regex,
            } => compare_field(document.get(*field), *op, value, regex.as_ref()),
        }
    }
}

impl std::fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serialize(self))
    }
}

/// Range predicate on a numeric field: `field > min` and/or `field < max`.
///
/// # Errors
///
/// Returns `EmptyFilterWarning` when both bounds are absent. The warning is
/// non-fatal; treat it as "no predicates".
pub fn range_filter(
    field: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Vec<FilterExpr>, EmptyFilterWarning> {
    if min.is_none() && max.is_none() {
        return Err(EmptyFilterWarning {
            context: "range filter",
        });
    }

    let mut exprs = Vec::with_capacity(2);
    if let Some(min) = min {
        exprs.push(FilterExpr::compare(field, Operator::Gt, min));
    }
    if let Some(max) = max {
        exprs.push(FilterExpr::compare(field, Operator::Lt, max));
    }
    Ok(exprs)
}

/// Predicate matching values of `field` that contain `text` literally.
pub fn substring_filter(field: &str, text: &str) -> FilterExpr {
    FilterExpr::compare(field, Operator::Regex, regex::escape(text))
}

/// Conjoin expressions, keeping input order.
///
/// One expression is returned unwrapped; two or more are wrapped in `$and`.
///
/// # Errors
///
/// Returns `EmptyFilterWarning` for an empty input.
pub fn combine(
    exprs: impl IntoIterator<Item = FilterExpr>,
) -> Result<FilterExpr, EmptyFilterWarning> {
    let mut exprs: Vec<FilterExpr> = exprs.into_iter().collect();
    match exprs.len() {
        0 => Err(EmptyFilterWarning {
            context: "combine filters",
        }),
        1 => Ok(exprs.remove(0)),
        _ => Ok(FilterExpr::And(exprs)),
    }
}

/// Render an expression as the text sent in the `where` parameter.
pub fn serialize(expr: &FilterExpr) -> String {
    expr.to_value().to_string()
}

/// Parse `where` text back into an expression.
///
/// # Errors
///
/// Returns `FilterError::InvalidJson` for malformed text, or any error of
/// [`FilterExpr::from_value`].
pub fn parse(text: &str, blacklist: &[String]) -> Result<FilterExpr, FilterError> {
    let value: Value =
        serde_json::from_str(text).map_err(|source| FilterError::InvalidJson { source })?;
    FilterExpr::from_value(&value, blacklist)
}

/// A possibly-empty filter, as sent by a client.
///
/// The empty filter sends no `where` parameter and so matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    expr: Option<FilterExpr>,
}

impl Filter {
    /// Conjoin expressions, falling back to the empty filter (with a logged
    /// warning) when there are none.
    pub fn all_of(exprs: impl IntoIterator<Item = FilterExpr>) -> Self {
        match combine(exprs) {
            Ok(expr) => Filter { expr: Some(expr) },
            Err(warning) => {
                warn!(%warning, "sending request without a filter");
                Filter::default()
            }
        }
    }

    pub fn expr(&self) -> Option<&FilterExpr> {
        self.expr.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    /// Value of the `where` query parameter, if any.
    pub fn where_param(&self) -> Option<String> {
        self.expr.as_ref().map(serialize)
    }
}

impl From<FilterExpr> for Filter {
    fn from(expr: FilterExpr) -> Self {
        Filter { expr: Some(expr) }
    }
}

// --- Internal implementation ---

fn check_blacklist(key: &str, blacklist: &[String]) -> Result<(), FilterError> {
    if blacklist.iter().any(|op| op == key) {
        return Err(FilterError::Blacklisted {
            operator: key.to_string(),
        });
    }
    Ok(())
}

fn parse_object(value: &Value, blacklist: &[String], path: &str) -> Result<FilterExpr, FilterError> {
    let Value::Object(map) = value else {
        return Err(FilterError::NotAnObject {
            actual: json_type_name(value).to_string(),
        });
    };

    let mut exprs = Vec::new();
    for (key, child) in map {
        let child_path = format!("{}/{}", path, key);

        if key.starts_with('$') {
            check_blacklist(key, blacklist)?;
            if key != AND {
                return Err(FilterError::UnknownOperator {
                    path: path.to_string(),
                    operator: key.clone(),
                });
            }
            let Value::Array(items) = child else {
                return Err(FilterError::InvalidOperand {
                    path: child_path,
                    operator: key.clone(),
                    message: format!("expected array, got {}", json_type_name(child)),
                });
            };
            let branches = items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_object(item, blacklist, &format!("{}/{}", child_path, i)))
                .collect::<Result<Vec<_>, _>>()?;
            exprs.push(FilterExpr::And(branches));
            continue;
        }

        match child {
            Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                for (op_key, operand) in ops {
                    check_blacklist(op_key, blacklist)?;
                    let op = Operator::parse(op_key).ok_or_else(|| FilterError::UnknownOperator {
                        path: child_path.clone(),
                        operator: op_key.clone(),
                    })?;
                    check_operand(op, operand, &child_path)?;
                    exprs.push(FilterExpr::compare(key.as_str(), op, operand.clone()));
                }
            }
            other => exprs.push(FilterExpr::compare(key.as_str(), Operator::Eq, other.clone())),
        }
    }

    if exprs.len() == 1 {
        Ok(exprs.remove(0))
    } else {
        Ok(FilterExpr::And(exprs))
    }
}

fn check_operand(op: Operator, operand: &Value, path: &str) -> Result<(), FilterError> {
    let invalid = |message: String| FilterError::InvalidOperand {
        path: path.to_string(),
        operator: op.as_str().to_string(),
        message,
    };

    match op {
        Operator::Regex => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| invalid(format!("expected string, got {}", json_type_name(operand))))?;
            Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
        }
        Operator::In if !operand.is_array() => {
            return Err(invalid(format!(
                "expected array, got {}",
                json_type_name(operand)
            )));
        }
        _ => {}
    }
    Ok(())
}

fn compare_field(
    actual: Option<&Value>,
    op: Operator,
    expected: &Value,
    regex: Option<&Regex>,
) -> bool {
    // A missing field behaves like null, as in the document store
    let actual = actual.unwrap_or(&Value::Null);

    match op {
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !values_equal(actual, expected),
        Operator::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(actual, item))),
        Operator::Regex => match (actual.as_str(), regex) {
            (Some(text), Some(re)) => re.is_match(text),
            _ => false,
        },
        Operator::Gt => order(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => order(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering between values of the same kind; mixed kinds don't compare.
fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
