//! Generic table rows.

use crate::error::{CoreError, CoreResult};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column values of a row, excluding `id` and `updated_at`.
pub type Fields = serde_json::Map<String, Value>;

const ID_KEY: &str = "id";
const UPDATED_AT_KEY: &str = "updated_at";

/// A record belonging to exactly one table.
///
/// Every row carries a stable `id` and an `updated_at` stamp used for
/// last-write-wins. All other columns live in `fields` and serialize flat
/// next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Stable record identifier.
    pub id: String,
    /// Time of the last write; compared by last-write-wins.
    #[serde(default)]
    pub updated_at: Timestamp,
    /// Remaining columns.
    #[serde(flatten)]
    pub fields: Fields,
}

impl Row {
    /// Creates an empty row with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            updated_at: Timestamp::EPOCH,
            fields: Fields::new(),
        }
    }

    /// Sets a field, returning the row.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets the `updated_at` stamp, returning the row.
    #[must_use]
    pub fn updated_at(mut self, at: Timestamp) -> Self {
        self.updated_at = at;
        self
    }

    /// Sets a field. `id` and `updated_at` are ignored.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key != ID_KEY && key != UPDATED_AT_KEY {
            self.fields.insert(key, value.into());
        }
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Merges a partial set of fields over this row.
    ///
    /// `id` and `updated_at` keys in `partial` are ignored; the caller
    /// stamps `updated_at`.
    pub fn merge(&mut self, partial: &Fields) {
        for (key, value) in partial {
            self.set(key.clone(), value.clone());
        }
    }

    /// Returns a copy without the named fields.
    #[must_use]
    pub fn without_fields(&self, fields: &[String]) -> Row {
        let mut row = self.clone();
        row.fields.retain(|k, _| !fields.iter().any(|f| f == k));
        row
    }

    /// Converts to a flat JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(ID_KEY.into(), Value::String(self.id.clone()));
        object.insert(UPDATED_AT_KEY.into(), Value::from(self.updated_at.as_millis()));
        Value::Object(object)
    }

    /// Builds a row from a flat JSON object.
    ///
    /// A missing `id` becomes the empty string and a missing `updated_at`
    /// becomes the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRow`] if `value` is not an object or
    /// `id`/`updated_at` have the wrong type.
    pub fn from_value(value: Value) -> CoreResult<Row> {
        let Value::Object(mut object) = value else {
            return Err(CoreError::invalid_row("row must be a JSON object"));
        };

        let id = match object.remove(ID_KEY) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(CoreError::invalid_row(format!(
                    "id must be a string, got {other}"
                )))
            }
        };

        let updated_at = match object.remove(UPDATED_AT_KEY) {
            None | Some(Value::Null) => Timestamp::EPOCH,
            Some(v) => v.as_i64().map(Timestamp::from_millis).ok_or_else(|| {
                CoreError::invalid_row(format!("updated_at must be an integer, got {v}"))
            })?,
        };

        Ok(Row {
            id,
            updated_at,
            fields: object,
        })
    }
}
