//! Records and their identity fields.
//!
//! A [`Record`] is an open-ended mapping of field names to BSON values. Two fields carry
//! identity:
//!
//! - [`PRIMARY_ID_FIELD`] (`_id`) is assigned by the store on creation and used to locate a
//!   record for update and removal.
//! - [`SECONDARY_ID_FIELD`] (`id`) is an optional independent identifier, assigned only when
//!   the service is configured to decouple external identity from storage identity.
//!
//! # Example
//!
//! ```ignore
//! use datalayer::record::Record;
//! use bson::doc;
//!
//! let mut record = Record::from(doc! { "msg": "hello" });
//! record.set_primary_id("abc");
//! assert!(record.has_id("abc"));
//! ```

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::error::{DataServiceError, DataServiceResult};

/// Field holding the store-assigned primary identifier.
pub const PRIMARY_ID_FIELD: &str = "_id";

/// Field holding the independent (secondary) identifier.
pub const SECONDARY_ID_FIELD: &str = "id";

/// Returns the identifier string carried by an identity value.
///
/// Non-empty strings are used as is, ObjectIds by their hex form and integers by their
/// decimal form. Anything else (including `null` and the empty string) is not an identifier.
pub fn id_string(value: &Bson) -> Option<String> {
    match value {
        Bson::String(id) if !id.is_empty() => Some(id.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::Int32(id) => Some(id.to_string()),
        Bson::Int64(id) => Some(id.to_string()),
        _ => None,
    }
}

/// A single stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Document);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self(Document::new())
    }

    /// Returns the underlying BSON document.
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    /// Consumes the record and returns the underlying BSON document.
    pub fn into_document(self) -> Document {
        self.0
    }

    /// Returns the value of a top-level field.
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.0.get(field)
    }

    /// Returns the value of a top-level field if it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        match self.0.get(field) {
            Some(Bson::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Sets a field, returning the previous value if there was one.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Bson>) -> Option<Bson> {
        self.0.insert(field, value)
    }

    /// Removes a field, returning its value if it was present.
    pub fn remove(&mut self, field: &str) -> Option<Bson> {
        self.0.remove(field)
    }

    /// Returns `true` if the record has a value for `field`.
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the primary identifier, if the record has one.
    pub fn primary_id(&self) -> Option<String> {
        self.0.get(PRIMARY_ID_FIELD).and_then(id_string)
    }

    /// Returns the secondary (independent) identifier, if the record has one.
    pub fn secondary_id(&self) -> Option<String> {
        self.0.get(SECONDARY_ID_FIELD).and_then(id_string)
    }

    /// Sets the primary identifier, replacing any existing value.
    pub fn set_primary_id(&mut self, id: impl Into<String>) {
        self.0.insert(PRIMARY_ID_FIELD, id.into());
    }

    /// Sets the secondary identifier, replacing any existing value.
    pub fn set_secondary_id(&mut self, id: impl Into<String>) {
        self.0.insert(SECONDARY_ID_FIELD, id.into());
    }

    /// Returns `true` if either identity field equals `id`.
    pub fn has_id(&self, id: &str) -> bool {
        self.primary_id().as_deref() == Some(id) || self.secondary_id().as_deref() == Some(id)
    }

    /// Returns `true` if both records carry the same primary identifier.
    pub fn same_primary_id(&self, other: &Record) -> bool {
        match (self.primary_id(), other.primary_id()) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// Returns `true` if the records share their primary or their secondary identifier.
    pub fn shares_identity(&self, other: &Record) -> bool {
        if self.same_primary_id(other) {
            return true;
        }

        match (self.secondary_id(), other.secondary_id()) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// Builds a record from any serializable value that serializes to a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the value is not a map/struct.
    pub fn from_value<T: Serialize>(value: &T) -> DataServiceResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(document) => Ok(Self(document)),
            other => Err(DataServiceError::InvalidRecord(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    /// Deserializes the record into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not match the shape of `T`.
    pub fn to_value<T: DeserializeOwned>(&self) -> DataServiceResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.0.clone()))?)
    }

    /// Builds a record from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object.
    pub fn from_json(value: Value) -> DataServiceResult<Self> {
        if !value.is_object() {
            return Err(DataServiceError::InvalidRecord(format!(
                "expected a JSON object, got {value}"
            )));
        }

        Ok(from_value(value)?)
    }

    /// Converts the record to a JSON value.
    pub fn to_json(&self) -> DataServiceResult<Value> {
        Ok(to_value(self)?)
    }
}

impl From<Document> for Record {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

impl From<Record> for Document {
    fn from(record: Record) -> Self {
        record.0
    }
}

impl From<Record> for Bson {
    fn from(record: Record) -> Self {
        Bson::Document(record.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Message {
        msg: String,
        priority: i32,
    }

    #[test]
    fn identity_values() {
        assert_eq!(id_string(&Bson::String("abc".into())), Some("abc".into()));
        assert_eq!(id_string(&Bson::String(String::new())), None);
        assert_eq!(id_string(&Bson::Int64(12)), Some("12".into()));
        assert_eq!(id_string(&Bson::Null), None);

        let oid = ObjectId::new();
        assert_eq!(id_string(&Bson::ObjectId(oid)), Some(oid.to_hex()));
    }

    #[test]
    fn empty_primary_id_counts_as_missing() {
        let record = Record::from(doc! { "_id": "", "msg": "hello" });
        assert_eq!(record.primary_id(), None);
    }

    #[test]
    fn has_id_checks_both_fields() {
        let record = Record::from(doc! { "_id": "p1", "id": "s1" });

        assert!(record.has_id("p1"));
        assert!(record.has_id("s1"));
        assert!(!record.has_id("other"));
    }

    #[test]
    fn shares_identity_requires_present_fields() {
        let a = Record::from(doc! { "_id": "p1" });
        let b = Record::from(doc! { "_id": "p2" });
        let c = Record::from(doc! { "_id": "p3", "id": "s1" });
        let d = Record::from(doc! { "id": "s1" });

        assert!(!a.shares_identity(&b));
        assert!(c.shares_identity(&d));
        assert!(a.shares_identity(&a.clone()));
    }

    #[test]
    fn typed_conversion() {
        let message = Message { msg: "hello".into(), priority: 3 };
        let record = Record::from_value(&message).unwrap();

        assert_eq!(record.get_str("msg"), Some("hello"));
        assert_eq!(record.to_value::<Message>().unwrap(), message);
    }

    #[test]
    fn scalars_are_not_records() {
        assert!(matches!(
            Record::from_value(&42),
            Err(DataServiceError::InvalidRecord(_))
        ));
        assert!(matches!(
            Record::from_json(serde_json::json!([1, 2])),
            Err(DataServiceError::InvalidRecord(_))
        ));
    }

    #[test]
    fn json_conversion() {
        let record = Record::from_json(serde_json::json!({ "msg": "hello" })).unwrap();

        assert_eq!(record.get_str("msg"), Some("hello"));
        assert_eq!(record.to_json().unwrap(), serde_json::json!({ "msg": "hello" }));
    }
}
