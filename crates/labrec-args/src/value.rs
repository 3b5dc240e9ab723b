//! Literal inference for captured argument values
//!
//! clap keeps the original token for every captured value. Experiments
//! record argument maps as JSON, so `--seed 234` should round-trip as a
//! number and `--tag v2` as a string. Inference order: integer, float,
//! bool, string.

use serde_json::Value;

/// Convert a raw argument token into the JSON value it spells.
pub fn infer_literal(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        // NaN and infinities have no JSON representation; keep the string.
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
