//! Conversion between plain JSON documents and Firestore typed values.

use serde_json::{json, Map, Number, Value};

use crate::error::{StoreError, StoreResult};

/// Encode one JSON value as a Firestore `Value`.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                json!({ "integerValue": integer.to_string() })
            } else {
                json!({ "doubleValue": number.as_f64().unwrap_or_default() })
            }
        }
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Encode a document body. Only JSON objects are storable.
pub fn encode_document(document: &Value) -> StoreResult<Value> {
    let map = document.as_object().ok_or_else(|| {
        StoreError::InvalidPayload("documents must be JSON objects".to_string())
    })?;
    Ok(json!({ "fields": encode_fields(map) }))
}

/// Decode one Firestore `Value` into plain JSON.
pub fn decode_value(value: &Value) -> StoreResult<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|map| map.iter().next()) else {
        return Err(StoreError::InvalidPayload(format!(
            "unexpected typed value: {value}"
        )));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
        "integerValue" => decode_integer(inner),
        "doubleValue" => Ok(inner
            .as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Ok(Value::String(inner.as_str().unwrap_or_default().to_string()))
        }
        "geoPointValue" => Ok(json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(Value::Null),
            "longitude": inner.get("longitude").cloned().unwrap_or(Value::Null),
        })),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<StoreResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => decode_fields(inner.get("fields")).map(Value::Object),
        other => Err(StoreError::InvalidPayload(format!(
            "unsupported value type: {other}"
        ))),
    }
}

fn decode_integer(inner: &Value) -> StoreResult<Value> {
    let parsed = match inner {
        Value::String(text) => text.parse::<i64>().ok(),
        Value::Number(number) => number.as_i64(),
        _ => None,
    };
    parsed
        .map(|integer| Value::Number(integer.into()))
        .ok_or_else(|| StoreError::InvalidPayload(format!("invalid integerValue: {inner}")))
}

fn decode_fields(fields: Option<&Value>) -> StoreResult<Map<String, Value>> {
    let Some(fields) = fields.and_then(Value::as_object) else {
        return Ok(Map::new());
    };
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

/// Decode a Firestore document resource. The `id` field falls back to the
/// last segment of the resource name.
pub fn decode_document(resource: &Value) -> StoreResult<Value> {
    let mut map = decode_fields(resource.get("fields"))?;
    if !map.contains_key("id") {
        if let Some(id) = resource
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| name.rsplit('/').next())
        {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
    }
    Ok(Value::Object(map))
}
