//! Step and branch conditions
//!
//! Predicate closures are the canonical form. The string form
//! (`"<path> <operator> <value>"`) is a convenience parser that produces a
//! [`Comparison`] over a closed set of [`Operator`]s.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use super::StepState;
use crate::context::Context;

/// Errors from parsing or evaluating a condition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// Expression has no property path
    #[error("condition expression is empty")]
    Empty,

    /// Operator token is not one of the supported operators
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// A binary operator was given without a right-hand value
    #[error("operator '{0}' requires a value")]
    MissingOperand(String),

    /// Predicate returned an error
    #[error("predicate failed: {0}")]
    Predicate(String),
}

/// Comparison operators understood by the expression parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
    /// `exists`: value is present and not null
    Exists,
    /// `empty`: value is absent, null, or an empty string/array/object
    Empty,
    /// No operator: truthiness of the resolved value
    Truthy,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::Exists => "exists",
            Self::Empty => "empty",
            Self::Truthy => "",
        }
    }

    fn takes_operand(&self) -> bool {
        matches!(
            self,
            Self::StrictEq | Self::StrictNe | Self::GreaterThan | Self::LessThan
        )
    }
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "===" => Ok(Self::StrictEq),
            "!==" => Ok(Self::StrictNe),
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            "exists" => Ok(Self::Exists),
            "empty" => Ok(Self::Empty),
            other => Err(ConditionError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply an operator to a resolved left value and an optional right operand
///
/// Pure: no context access, no allocation beyond number coercion.
pub fn compare(op: Operator, left: Option<&Value>, right: Option<&Value>) -> bool {
    match op {
        Operator::StrictEq => matches!((left, right), (Some(l), Some(r)) if strict_eq(l, r)),
        Operator::StrictNe => !compare(Operator::StrictEq, left, right),
        Operator::GreaterThan => ordering(left, right).is_some_and(|o| o.is_gt()),
        Operator::LessThan => ordering(left, right).is_some_and(|o| o.is_lt()),
        Operator::Exists => left.is_some_and(|v| !v.is_null()),
        Operator::Empty => match left {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        },
        Operator::Truthy => is_truthy(left),
    }
}

/// Truthiness of a resolved value: absent, null, false, 0, NaN and "" are false
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        // 5 and 5.0 are the same number
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

fn ordering(left: Option<&Value>, right: Option<&Value>) -> Option<std::cmp::Ordering> {
    match (left?, right?) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (l, r) => as_number(l)?.partial_cmp(&as_number(r)?),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// A parsed `<path> <operator> <value>` expression
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Dotted path resolved against the context
    pub path: String,
    pub operator: Operator,
    pub operand: Option<Value>,
}

impl Comparison {
    pub fn new(path: impl Into<String>, operator: Operator, operand: Option<Value>) -> Self {
        Self {
            path: path.into(),
            operator,
            operand,
        }
    }

    /// Parse a whitespace-separated expression
    ///
    /// The operand is read as a JSON literal when possible (`5`, `true`,
    /// `null`, `"gold"`), with single quotes stripped, else as a bare string.
    /// Everything after the operator is the operand, so it may contain spaces.
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let mut tokens = expr.split_whitespace();
        let path = tokens.next().ok_or(ConditionError::Empty)?;

        let Some(op_token) = tokens.next() else {
            return Ok(Self::new(path, Operator::Truthy, None));
        };
        let operator: Operator = op_token.parse()?;

        let rest: Vec<&str> = tokens.collect();
        let operand = if rest.is_empty() {
            None
        } else {
            Some(parse_operand(&rest.join(" ")))
        };

        if operator.takes_operand() && operand.is_none() {
            return Err(ConditionError::MissingOperand(op_token.to_string()));
        }

        Ok(Self::new(path, operator, operand))
    }

    pub fn evaluate(&self, context: &Context) -> bool {
        compare(
            self.operator,
            context.get_path(&self.path),
            self.operand.as_ref(),
        )
    }
}

fn parse_operand(raw: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    Value::String(unquoted.to_string())
}

/// Predicate over the context and running state
pub type Predicate = Arc<dyn Fn(&Context, &StepState) -> anyhow::Result<bool> + Send + Sync>;

/// Condition attached to a step or a conditional-composition branch
#[derive(Clone)]
pub enum Condition {
    /// Unparsed expression, parsed on validation and on each evaluation
    Expression(String),
    /// Pre-built comparison
    Compare(Comparison),
    /// Arbitrary predicate
    Predicate(Predicate),
}

impl Condition {
    pub fn expression(expr: impl Into<String>) -> Self {
        Self::Expression(expr.into())
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &StepState) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Check that an expression parses; other forms are always valid
    pub fn validate(&self) -> Result<(), ConditionError> {
        match self {
            Self::Expression(expr) => Comparison::parse(expr).map(|_| ()),
            Self::Compare(_) | Self::Predicate(_) => Ok(()),
        }
    }

    /// Evaluate the condition
    ///
    /// Callers treat an `Err` as "do not run".
    pub fn evaluate(&self, context: &Context, state: &StepState) -> Result<bool, ConditionError> {
        match self {
            Self::Expression(expr) => Ok(Comparison::parse(expr)?.evaluate(context)),
            Self::Compare(comparison) => Ok(comparison.evaluate(context)),
            Self::Predicate(predicate) => predicate(context, state)
                .map_err(|e| ConditionError::Predicate(format!("{e:#}"))),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expr) => f.debug_tuple("Expression").field(expr).finish(),
            Self::Compare(comparison) => f.debug_tuple("Compare").field(comparison).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Condition {
    fn from(expr: &str) -> Self {
        Self::Expression(expr.to_string())
    }
}

impl From<String> for Condition {
    fn from(expr: String) -> Self {
        Self::Expression(expr)
    }
}

impl From<Comparison> for Condition {
    fn from(comparison: Comparison) -> Self {
        Self::Compare(comparison)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecuteOptions;
    use serde_json::json;

    fn state() -> StepState {
        StepState::detached("test", ExecuteOptions::default())
    }

    fn eval(expr: &str, context: Value) -> bool {
        Condition::from(expr)
            .evaluate(&Context::from(context), &state())
            .unwrap()
    }

    #[test]
    fn test_strict_equality() {
        assert!(eval("x === 5", json!({ "x": 5 })));
        assert!(!eval("x === 5", json!({ "x": 4 })));
        assert!(eval("x === 5", json!({ "x": 5.0 })));
        assert!(!eval("x === 5", json!({ "x": "5" })));
        assert!(eval("tier === gold", json!({ "tier": "gold" })));
        assert!(eval("tier === 'gold'", json!({ "tier": "gold" })));
        assert!(eval("x !== 5", json!({ "x": 4 })));
        assert!(eval("x !== 5", json!({})));
    }

    #[test]
    fn test_ordering() {
        assert!(eval("count > 3", json!({ "count": 4 })));
        assert!(!eval("count > 3", json!({ "count": 3 })));
        assert!(eval("count < 3", json!({ "count": "2" })));
        assert!(!eval("count < 3", json!({})));
        assert!(eval("name > alpha", json!({ "name": "beta" })));
    }

    #[test]
    fn test_exists_and_empty() {
        assert!(eval("plan exists", json!({ "plan": {} })));
        assert!(!eval("plan exists", json!({ "plan": null })));
        assert!(!eval("plan exists", json!({})));

        assert!(eval("items empty", json!({ "items": [] })));
        assert!(eval("items empty", json!({})));
        assert!(eval("note empty", json!({ "note": "" })));
        assert!(!eval("items empty", json!({ "items": [1] })));
    }

    #[test]
    fn test_truthy_default() {
        assert!(eval("enabled", json!({ "enabled": true })));
        assert!(!eval("enabled", json!({ "enabled": 0 })));
        assert!(!eval("enabled", json!({})));
        assert!(eval("user.roles", json!({ "user": { "roles": [] } })));
    }

    #[test]
    fn test_dotted_path() {
        assert!(eval("order.total > 100", json!({ "order": { "total": 150 } })));
    }

    #[test]
    fn test_operand_with_spaces() {
        let comparison = Comparison::parse("title === Quarterly Plan").unwrap();
        assert_eq!(comparison.operand, Some(json!("Quarterly Plan")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Comparison::parse("   "), Err(ConditionError::Empty));
        assert_eq!(
            Comparison::parse("x == 5"),
            Err(ConditionError::UnknownOperator("==".to_string()))
        );
        assert_eq!(
            Comparison::parse("x ==="),
            Err(ConditionError::MissingOperand("===".to_string()))
        );
    }

    #[test]
    fn test_predicate_error_is_reported() {
        let condition = Condition::predicate(|_, _| anyhow::bail!("boom"));
        let result = condition.evaluate(&Context::new(), &state());
        assert_eq!(result, Err(ConditionError::Predicate("boom".to_string())));
    }

    #[test]
    fn test_predicate_sees_state() {
        let condition = Condition::predicate(|_, state| Ok(state.workflow_name == "test"));
        assert!(condition.evaluate(&Context::new(), &state()).unwrap());
    }

    #[test]
    fn test_compare_is_pure() {
        assert!(compare(Operator::StrictEq, Some(&json!(true)), Some(&json!(true))));
        assert!(!compare(Operator::StrictEq, None, Some(&json!(null))));
        assert!(compare(Operator::Empty, None, None));
        assert!(!compare(Operator::GreaterThan, Some(&json!([1])), Some(&json!(0))));
    }
}
