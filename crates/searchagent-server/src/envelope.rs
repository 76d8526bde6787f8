//! JSON envelopes for operation outcomes.
//!
//! Success: `{"success": true, ...payload}`.
//! Failure: `{"success": false, <echo>: ..., "error": ..., "error_type": ...}`,
//! where `<echo>` repeats the request field the operation was called with.

use searchagent::Outcome;
use serde::Serialize;
use serde_json::Value;

/// Request field echoed back on failure.
#[derive(Debug, Clone)]
pub struct Echo {
    pub field: &'static str,
    pub value: Value,
}

impl Echo {
    pub fn new(field: &'static str, value: impl Into<Value>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

pub fn outcome_envelope<T: Serialize>(outcome: Outcome<T>, echo: Echo) -> serde_json::Result<Value> {
    match outcome {
        Outcome::Success(payload) => success_envelope(&payload),
        Outcome::Failure(f) => {
            let mut v = serde_json::json!({
                "success": false,
                "error": f.error,
                "error_type": f.error_type,
            });
            v[echo.field] = echo.value;
            Ok(v)
        }
    }
}

pub fn success_envelope<T: Serialize>(payload: &T) -> serde_json::Result<Value> {
    let mut v = serde_json::to_value(payload)?;
    match v.as_object_mut() {
        Some(obj) => {
            obj.insert("success".to_string(), Value::Bool(true));
            Ok(v)
        }
        None => Ok(serde_json::json!({ "success": true, "result": v })),
    }
}
