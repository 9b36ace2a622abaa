use serde_json::Value;

use crate::types::HttpResponse;

/// A predicate over a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// The response has exactly this status code.
    Status(u16),
    /// The body decodes as JSON and is not `null`, `false`, `0` or an empty string.
    JsonTruthy,
    /// The body decodes as a JSON array.
    JsonArray,
    /// The body decodes as a JSON object and this field is `null`, an object or an array.
    FieldNullOrObject(String),
    /// The body is longer than this many bytes.
    BodyLongerThan(usize),
}

/// The result of evaluating a [Check].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub passed: bool,
    /// Why the check failed, or a short description of what passed.
    pub message: String,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

impl Check {
    /// Evaluate the check. A body that is not JSON fails any JSON check.
    pub fn evaluate(&self, response: &HttpResponse) -> CheckResult {
        match self {
            Check::Status(expected) => {
                if response.status == *expected {
                    CheckResult::pass(format!("status {expected}"))
                } else {
                    CheckResult::fail(format!(
                        "expected status {expected}, got {}",
                        response.status
                    ))
                }
            }
            Check::JsonTruthy => match response.json_value() {
                Ok(value) if is_truthy(&value) => CheckResult::pass("body is JSON"),
                Ok(value) => CheckResult::fail(format!("body is JSON but empty: {value}")),
                Err(e) => CheckResult::fail(format!("body is not JSON: {e}")),
            },
            Check::JsonArray => match response.json_value() {
                Ok(Value::Array(items)) => {
                    CheckResult::pass(format!("body is an array of {}", items.len()))
                }
                Ok(other) => CheckResult::fail(format!("expected an array, got {}", kind(&other))),
                Err(e) => CheckResult::fail(format!("body is not JSON: {e}")),
            },
            Check::FieldNullOrObject(field) => match response.json_value() {
                Ok(Value::Object(map)) => match map.get(field) {
                    Some(Value::Null | Value::Object(_) | Value::Array(_)) => {
                        CheckResult::pass(format!("`{field}` is present"))
                    }
                    Some(other) => CheckResult::fail(format!(
                        "expected `{field}` to be null or an object, got {}",
                        kind(other)
                    )),
                    None => CheckResult::fail(format!("`{field}` is missing")),
                },
                Ok(other) => {
                    CheckResult::fail(format!("expected an object, got {}", kind(&other)))
                }
                Err(e) => CheckResult::fail(format!("body is not JSON: {e}")),
            },
            Check::BodyLongerThan(min) => {
                if response.body.len() > *min {
                    CheckResult::pass(format!("body has {} bytes", response.body.len()))
                } else {
                    CheckResult::fail(format!(
                        "expected more than {min} bytes, got {}",
                        response.body.len()
                    ))
                }
            }
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A [Check] with the name it is reported under, for example `status is 200`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCheck {
    pub name: String,
    pub check: Check,
}

impl NamedCheck {
    pub fn new(name: &str, check: Check) -> Self {
        Self {
            name: name.to_string(),
            check,
        }
    }

    pub fn evaluate(&self, response: &HttpResponse) -> CheckResult {
        self.check.evaluate(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(body: &str) -> HttpResponse {
        HttpResponse::new(200, body.to_string()).with_content_type("application/json")
    }

    #[test]
    fn status() {
        assert!(Check::Status(201).evaluate(&HttpResponse::new(201, "")).passed);

        let result = Check::Status(200).evaluate(&HttpResponse::new(404, ""));
        assert!(!result.passed);
        assert_eq!("expected status 200, got 404", result.message);
    }

    #[test]
    fn json_truthy() {
        assert!(Check::JsonTruthy.evaluate(&json(r#"{"productId": 1}"#)).passed);
        assert!(Check::JsonTruthy.evaluate(&json("[]")).passed);
        assert!(Check::JsonTruthy.evaluate(&json("1")).passed);

        for body in ["null", "false", "0", r#""""#, "<html>"] {
            assert!(
                !Check::JsonTruthy.evaluate(&json(body)).passed,
                "{body} should not pass"
            );
        }
    }

    #[test]
    fn json_array() {
        assert!(Check::JsonArray.evaluate(&json(r#"[{"id": 1}]"#)).passed);
        assert!(!Check::JsonArray.evaluate(&json(r#"{"items": []}"#)).passed);
        assert!(!Check::JsonArray.evaluate(&json("")).passed);
    }

    #[test]
    fn field_null_or_object() {
        let check = Check::FieldNullOrObject("inventory".to_string());

        assert!(check.evaluate(&json(r#"{"id": 1, "inventory": null}"#)).passed);
        assert!(check.evaluate(&json(r#"{"id": 1, "inventory": {"quantity": 3}}"#)).passed);
        assert!(!check.evaluate(&json(r#"{"id": 1, "inventory": 3}"#)).passed);
        assert!(!check.evaluate(&json(r#"{"id": 1}"#)).passed);
        assert!(!check.evaluate(&json("[]")).passed);
    }

    #[test]
    fn body_longer_than() {
        assert!(Check::BodyLongerThan(2).evaluate(&json(r#"[1]"#)).passed);
        assert!(!Check::BodyLongerThan(2).evaluate(&json("[]")).passed);
    }
}
