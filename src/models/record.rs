//! Row records as JSON maps.
//!
//! Every read operation yields rows in this shape; expanded fetches nest
//! arrays of related records under the related table's name.

use serde_json::Value as JsonValue;

/// A single row, keyed by column name.
pub type Record = serde_json::Map<String, JsonValue>;

/// Pull a named value out of a record, treating a missing key as JSON null.
pub fn field<'a>(record: &'a Record, name: &str) -> &'a JsonValue {
    record.get(name).unwrap_or(&JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_lookup() {
        let mut record = Record::new();
        record.insert("id".to_string(), json!(7));
        assert_eq!(field(&record, "id"), &json!(7));
        assert_eq!(field(&record, "missing"), &JsonValue::Null);
    }
}
