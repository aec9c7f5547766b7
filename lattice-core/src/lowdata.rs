//! Low-data chunk pairing.
//!
//! A request body decodes to a mapping of command fields. List-valued fields
//! fan out into one chunk per position; scalar fields repeat into every
//! chunk. The gateway never interprets the fields themselves — `client`,
//! `tgt`, `fun`, `arg` and friends are opaque here and only mean something to
//! the control plane.

use serde_json::{Map, Value};

use crate::error::GatewayError;

/// One unit of work submitted to the control plane.
pub type Chunk = Map<String, Value>;

/// Pair decoded body fields into an ordered batch of complete chunks.
///
/// Every list-valued field must carry the same number of values; that count
/// is the batch size. Scalar fields repeat into each chunk. A mapping with no
/// fields pairs to an empty batch.
pub fn pair(fields: &Map<String, Value>) -> Result<Vec<Chunk>, GatewayError> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }

    // All list fields must agree on a width before any chunk is built.
    let mut width: Option<(&str, usize)> = None;
    for (key, value) in fields {
        if let Value::Array(items) = value {
            match width {
                None => width = Some((key, items.len())),
                Some((first, len)) if len != items.len() => {
                    return Err(GatewayError::MalformedBatch(format!(
                        "{first} has {len} values but {key} has {}",
                        items.len()
                    )));
                }
                Some(_) => {}
            }
        }
    }

    let count = width.map(|(_, len)| len).unwrap_or(1);
    let mut batch = Vec::with_capacity(count);
    for index in 0..count {
        let mut chunk = Chunk::new();
        for (key, value) in fields {
            let item = match value {
                Value::Array(items) => items[index].clone(),
                scalar => scalar.clone(),
            };
            if item.is_null() {
                return Err(GatewayError::MalformedBatch(format!(
                    "{key} is empty at position {index}"
                )));
            }
            chunk.insert(key.clone(), item);
        }
        batch.push(chunk);
    }

    Ok(batch)
}
