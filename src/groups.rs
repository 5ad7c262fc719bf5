//! Extensible-group assembly
//!
//! Ordered collections become repeated fixed-width tuples at the end of a
//! record. Appends never reorder, so tuple order is source order.

use crate::error::{BridgeError, Result};
use crate::record::{FieldValue, TargetRecord};

/// Append one tuple to the record's extensible group
pub fn append_group<I>(record: &mut TargetRecord, tuple: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Into<FieldValue>,
{
    let arity = record
        .schema()
        .extensible_group_arity()
        .ok_or_else(|| BridgeError::NotExtensible {
            tag: record.tag().to_string(),
        })?;

    let tuple: Vec<FieldValue> = tuple.into_iter().map(Into::into).collect();
    if tuple.len() != arity {
        return Err(BridgeError::GroupArity {
            tag: record.tag().to_string(),
            expected: arity,
            actual: tuple.len(),
        });
    }

    record.push_group(tuple);
    Ok(())
}

/// Append tuples in order. Stops at the first malformed tuple; tuples
/// before it stay appended.
pub fn append_groups<T, I>(record: &mut TargetRecord, tuples: T) -> Result<()>
where
    T: IntoIterator<Item = I>,
    I: IntoIterator,
    I::Item: Into<FieldValue>,
{
    for tuple in tuples {
        append_group(record, tuple)?;
    }
    Ok(())
}
