//! Conversion between script values and `serde_json` values.

use serde_json::{Map, Number, Value as Json};

use crate::error::{Error, Result};
use crate::script::{Record, Value};

/// Convert a script value to JSON.  Functions have no JSON form.
pub fn to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::Number((*n).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| Error::Json(format!("{f} has no JSON representation")))?,
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect::<Result<_>>()?),
        Value::Record(rec) => {
            let mut map = Map::new();
            for (k, v) in rec {
                map.insert(k.clone(), to_json(v)?);
            }
            Json::Object(map)
        }
        Value::Native(_) | Value::Func(_) => {
            return Err(Error::Json(format!("a {} cannot be encoded as JSON", value.type_name())))
        }
    })
}

/// Convert JSON to a script value.  Integers that fit `i64` become `Int`;
/// every other number becomes `Float`.
pub fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        Json::Object(map) => Value::Record(
            map.into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<Record>(),
        ),
    }
}

/// Parse a response body.  Invalid JSON is an error naming the cause.
pub fn parse_json(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body)
        .map(from_json)
        .map_err(|e| Error::Json(format!("response body is not valid JSON: {e}")))
}
