//! Output fingerprints for comparing runs

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::record::TargetRecord;

/// SHA256 over an ordered record sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Fingerprint of records in order: tag, name and every field
    pub fn of_records(records: &[TargetRecord]) -> Self {
        let mut hasher = Sha256::new();
        for record in records {
            // Documents hold only strings and plain values; serialization cannot fail
            let line = serde_json::to_vec(&record.to_document()).unwrap_or_default();
            hasher.update(&line);
            hasher.update(b"\n");
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use crate::schema::FieldSchema;
    use std::sync::Arc;

    fn zone(name: &str, multiplier: i64) -> TargetRecord {
        let mut record = TargetRecord::new(Arc::new(FieldSchema::new("Zone", ["Multiplier"])));
        record.set_name(name);
        record.set("Multiplier", FieldValue::Integer(multiplier)).unwrap();
        record
    }

    #[test]
    fn test_fingerprint_consistency() {
        let records = vec![zone("A", 1), zone("B", 2)];
        assert_eq!(Fingerprint::of_records(&records), Fingerprint::of_records(&records));
        assert_eq!(Fingerprint::of_records(&records).as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let ab = vec![zone("A", 1), zone("B", 2)];
        let ba = vec![zone("B", 2), zone("A", 1)];
        assert_ne!(Fingerprint::of_records(&ab), Fingerprint::of_records(&ba));
    }

    #[test]
    fn test_fingerprint_sees_field_changes() {
        assert_ne!(
            Fingerprint::of_records(&[zone("A", 1)]),
            Fingerprint::of_records(&[zone("A", 2)])
        );
        assert_eq!(Fingerprint::from_bytes(b"abc").short().len(), 12);
    }
}
