//! Record type and tolerant field access.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field map of a record. Values are raw JSON so the store never has to
/// know table schemas.
pub type Fields = serde_json::Map<String, Value>;

/// A single stored record: an opaque id plus its field map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    /// First non-empty string value among the given field-name aliases.
    ///
    /// Column names drift between deployments ("Phone Number" vs
    /// "PhoneNumber"); callers pass every spelling they accept.
    pub fn str_field(&self, aliases: &[&str]) -> Option<&str> {
        for alias in aliases {
            if let Some(Value::String(s)) = self.fields.get(*alias) {
                if !s.trim().is_empty() {
                    return Some(s.as_str());
                }
            }
        }
        None
    }

    /// First integer value among the given aliases. Numeric strings are
    /// accepted since some backends return every cell as text.
    pub fn int_field(&self, aliases: &[&str]) -> Option<i64> {
        for alias in aliases {
            match self.fields.get(*alias) {
                Some(Value::Number(n)) => {
                    if let Some(v) = n.as_i64() {
                        return Some(v);
                    }
                }
                Some(Value::String(s)) => {
                    if let Ok(v) = s.trim().parse() {
                        return Some(v);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Whether any of the aliases holds a non-empty string.
    pub fn has_field(&self, aliases: &[&str]) -> bool {
        self.str_field(aliases).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        Record {
            id: "rec000001".into(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_str_field_alias_order() {
        let rec = record(json!({"PhoneNumber": "+15550001111"}));
        assert_eq!(
            rec.str_field(&["Phone Number", "PhoneNumber"]),
            Some("+15550001111")
        );
    }

    #[test]
    fn test_str_field_skips_empty() {
        let rec = record(json!({"Phone Number": "  ", "PhoneNumber": "+15550001111"}));
        assert_eq!(
            rec.str_field(&["Phone Number", "PhoneNumber"]),
            Some("+15550001111")
        );
    }

    #[test]
    fn test_int_field_accepts_numeric_string() {
        let rec = record(json!({"Error Count": "3"}));
        assert_eq!(rec.int_field(&["Error Count"]), Some(3));

        let rec = record(json!({"Error Count": 4}));
        assert_eq!(rec.int_field(&["Error Count"]), Some(4));
    }

    #[test]
    fn test_missing_field_is_none() {
        let rec = record(json!({}));
        assert_eq!(rec.str_field(&["Phone Number"]), None);
        assert_eq!(rec.int_field(&["Error Count"]), None);
        assert!(!rec.has_field(&["Phone Number"]));
    }
}
