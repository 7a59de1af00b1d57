use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key that marks a variable reference, e.g. `{"var": "temperature"}`.
pub const VAR_KEY: &str = "var";

/// A JsonLogic rule, classified once at ingestion.
///
/// A JSON object with exactly one key is always read as an operator call (or a
/// variable reference when the key is `var`). A literal object that happens to
/// have a single key is therefore indistinguishable from an operator call; the
/// grammar accepts that ambiguity and so does this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Expression {
    Operator { name: String, args: Vec<Expression> },
    Var { name: String },
    Literal(Value),
}

impl Expression {
    pub fn operator(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Operator {
            name: name.into(),
            args,
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expression::Var { name: name.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    /// The neutral rule `{}` produced for an empty or disconnected canvas.
    pub fn empty() -> Self {
        Expression::Literal(Value::Object(Map::new()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Expression::Literal(Value::Object(map)) if map.is_empty())
    }

    pub fn from_value(value: &Value) -> Self {
        if let Value::Object(map) = value {
            if map.len() == 1 {
                if let Some((key, inner)) = map.iter().next() {
                    if key == VAR_KEY {
                        return Expression::Var {
                            name: var_name(inner),
                        };
                    }
                    let args = match inner {
                        Value::Array(items) => items.iter().map(Expression::from_value).collect(),
                        single => vec![Expression::from_value(single)],
                    };
                    return Expression::Operator {
                        name: key.clone(),
                        args,
                    };
                }
            }
        }
        Expression::Literal(value.clone())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Expression::Operator { name, args } => {
                let mut map = Map::with_capacity(1);
                map.insert(
                    name.clone(),
                    Value::Array(args.iter().map(Expression::to_value).collect()),
                );
                Value::Object(map)
            }
            Expression::Var { name } => {
                let mut map = Map::with_capacity(1);
                map.insert(VAR_KEY.to_string(), Value::String(name.clone()));
                Value::Object(map)
            }
            Expression::Literal(value) => value.clone(),
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::from_value(&value)
    }
}

impl From<&Value> for Expression {
    fn from(value: &Value) -> Self {
        Expression::from_value(value)
    }
}

impl From<Expression> for Value {
    fn from(expr: Expression) -> Self {
        expr.to_value()
    }
}

/// Textual name of a `var` operand. Non-string operands are rendered the way
/// they read in source (`1`, `true`, `null`, array items joined by commas).
fn var_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(var_name)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_operator_var_and_literal() {
        let expr = Expression::from_value(&json!({"==": [{"var": "temperature"}, 22]}));
        assert_eq!(
            expr,
            Expression::operator(
                "==",
                vec![Expression::var("temperature"), Expression::literal(22)]
            )
        );
    }

    #[test]
    fn single_operand_is_normalized_to_list() {
        let expr = Expression::from_value(&json!({"!": {"var": "flag"}}));
        assert_eq!(expr, Expression::operator("!", vec![Expression::var("flag")]));
        assert_eq!(expr.to_value(), json!({"!": [{"var": "flag"}]}));
    }

    #[test]
    fn multi_key_objects_and_arrays_are_literals() {
        let obj = json!({"a": 1, "b": 2});
        assert_eq!(Expression::from_value(&obj), Expression::Literal(obj.clone()));
        let arr = json!([1, 2, 3]);
        assert_eq!(Expression::from_value(&arr), Expression::Literal(arr.clone()));
        assert!(Expression::from_value(&json!({})).is_empty());
    }

    #[test]
    fn non_string_var_operand_is_rendered_as_text() {
        assert_eq!(Expression::from_value(&json!({"var": 1})), Expression::var("1"));
        assert_eq!(
            Expression::from_value(&json!({"var": ["a", 0]})),
            Expression::var("a,0")
        );
    }

    #[test]
    fn serde_goes_through_json_grammar() {
        let text = r#"{"and":[{"var":"a"},true]}"#;
        let expr: Expression = serde_json::from_str(text).unwrap();
        assert_eq!(
            expr,
            Expression::operator("and", vec![Expression::var("a"), Expression::literal(true)])
        );
        assert_eq!(serde_json::to_string(&expr).unwrap(), text);
    }
}
