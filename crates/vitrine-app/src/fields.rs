// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};

use crate::model::Entity;

fn segments(path: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|part| part.trim().is_empty()) {
        bail!("invalid field path {path:?}; use dotted names like `price` or `artist.name`");
    }
    Ok(parts)
}

pub fn read_field<T: Entity>(row: &T, path: &str) -> Result<Value> {
    let value = serde_json::to_value(row).context("encode row")?;
    let mut cursor = &value;
    for segment in segments(path)? {
        cursor = cursor
            .get(segment)
            .ok_or_else(|| anyhow!("row has no field {path:?}"))?;
    }
    Ok(cursor.clone())
}

/// Returns a copy of `row` with the field at `path` replaced. The new value
/// must decode back into `T`, so type mismatches are rejected here rather than
/// after the request has gone out.
pub fn with_field<T: Entity>(row: &T, path: &str, value: &Value) -> Result<T> {
    let mut encoded = serde_json::to_value(row).context("encode row")?;
    let parts = segments(path)?;
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| anyhow!("empty field path"))?;

    let mut cursor = &mut encoded;
    for segment in parents {
        cursor = cursor
            .get_mut(*segment)
            .ok_or_else(|| anyhow!("row has no field {path:?}"))?;
    }
    let object = cursor
        .as_object_mut()
        .ok_or_else(|| anyhow!("field {path:?} is not inside an object"))?;
    if !object.contains_key(*last) {
        bail!("row has no field {path:?}");
    }
    object.insert((*last).to_owned(), value.clone());

    serde_json::from_value(encoded).with_context(|| format!("value {value} does not fit {path:?}"))
}

/// Builds the body of a partial update: `{"id": 7, "artist": {"name": "x"}}`.
pub fn partial_update_body(entity_id: i64, path: &str, value: &Value) -> Result<Value> {
    let parts = segments(path)?;
    if parts.first() == Some(&"id") {
        bail!("the id field cannot be updated");
    }

    let mut nested = value.clone();
    for segment in parts.iter().skip(1).rev() {
        let mut wrapper = Map::new();
        wrapper.insert((*segment).to_owned(), nested);
        nested = Value::Object(wrapper);
    }

    let mut body = Map::new();
    body.insert("id".to_owned(), Value::from(entity_id));
    body.insert(parts[0].to_owned(), nested);
    Ok(Value::Object(body))
}
