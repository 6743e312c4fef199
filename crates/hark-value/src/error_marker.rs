//! Encoding for propagated errors (spec §7). The value model has no
//! dedicated error variant, so a thread that errors resolves its terminal
//! future with an ordinary `Value::Record` carrying a reserved field; any
//! code that reads a future's value — immediately or after being woken —
//! checks for this shape before treating the value as program data.

use std::collections::BTreeMap;

use crate::{HarkError, Symbol, Value};

const ERROR_MARKER_KEY: &str = "__hark_error__";

pub fn error_marker(err: &HarkError) -> Value {
    let mut fields = BTreeMap::new();
    let encoded = serde_json::to_string(err).expect("HarkError always serializes");
    fields.insert(Symbol::new(ERROR_MARKER_KEY), Value::String(encoded));
    Value::Record(fields)
}

pub fn as_error_marker(value: &Value) -> Option<HarkError> {
    match value {
        Value::Record(fields) => fields.get(&Symbol::new(ERROR_MARKER_KEY)).and_then(|v| match v {
            Value::String(s) => serde_json::from_str(s).ok(),
            _ => None,
        }),
        _ => None,
    }
}
