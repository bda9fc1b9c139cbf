//! Structural merge of JSON fragments.
//!
//! The history normalizers build one wire message per run of adjacent
//! conversation parts by merging the parts' individual wire fragments
//! together. The merge is pure and shape-directed: sequences concatenate,
//! mappings combine key by key.

use serde_json::map::Entry;
use serde_json::Value;

use crate::errors::MergeError;

/// Merge two JSON values of matching shape.
///
/// - Two arrays concatenate, `a` elements first.
/// - Two objects combine: keys only in `b` are copied over; keys present in
///   both merge recursively when the existing value is a container, and must
///   be equal otherwise ([`MergeError::Conflict`]).
/// - Any other pairing is a [`MergeError::TypeMismatch`].
pub fn merge(a: Value, b: Value) -> Result<Value, MergeError> {
    match (a, b) {
        (Value::Array(mut left), Value::Array(right)) => {
            left.extend(right);
            Ok(Value::Array(left))
        }
        (Value::Object(mut left), Value::Object(right)) => {
            for (key, incoming) in right {
                match left.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(incoming);
                    }
                    Entry::Occupied(mut slot) => {
                        let existing = slot.get_mut();
                        if existing.is_object() || existing.is_array() {
                            let current = existing.take();
                            *existing = merge(current, incoming)?;
                        } else if *existing != incoming {
                            return Err(MergeError::Conflict {
                                key: slot.key().clone(),
                                left: slot.get().clone(),
                                right: incoming,
                            });
                        }
                    }
                }
            }
            Ok(Value::Object(left))
        }
        (left, right) => Err(MergeError::TypeMismatch { left, right }),
    }
}
