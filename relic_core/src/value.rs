//! Field-data values: the payload of one serialized field.
//! Converters read and write these; the engine only inspects the variant.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::identity::ObjRef;

/// Ordered field name -> value map, one per node and one per component.
pub type FieldData = IndexMap<String, FieldValue>;

/// One serialized field value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    /// Primitive or structured payload, opaque to the engine.
    Data(serde_json::Value),
    /// Stable key standing in for an object or asset reference.
    Ref(String),
    /// Capture-side placeholder for a reference whose key is not known until
    /// the whole walk finishes. Never present in a finalized snapshot.
    Pending(ObjRef),
}

impl FieldValue {
    pub fn as_ref_key(&self) -> Option<&str> {
        match self {
            FieldValue::Ref(key) => Some(key),
            _ => None,
        }
    }
}

/// Serialize `value` into `data[field]`. A value that fails to serialize is
/// dropped with a log line; one bad field never aborts the walk.
pub fn put<T: Serialize>(data: &mut FieldData, field: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(v) => {
            data.insert(field.to_string(), FieldValue::Data(v));
        }
        Err(e) => debug!("field '{field}' could not be serialized: {e}"),
    }
}

/// Read `data[field]` back as a typed value. Missing fields, reference fields
/// and type mismatches all read as `None`.
pub fn get<T: DeserializeOwned>(data: &FieldData, field: &str) -> Option<T> {
    match data.get(field)? {
        FieldValue::Data(v) => serde_json::from_value(v.clone()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let mut data = FieldData::default();
        put(&mut data, "speed", &4.5f32);
        put(&mut data, "label", &"hello".to_string());
        assert_eq!(get::<f32>(&data, "speed"), Some(4.5));
        assert_eq!(get::<String>(&data, "label"), Some("hello".to_string()));
    }

    #[test]
    fn get_missing_or_mistyped_is_none() {
        let mut data = FieldData::default();
        put(&mut data, "speed", &1.0f32);
        assert_eq!(get::<f32>(&data, "velocity"), None);
        assert_eq!(get::<Vec<u8>>(&data, "speed"), None);
    }

    #[test]
    fn ref_fields_do_not_read_as_data() {
        let mut data = FieldData::default();
        data.insert("target".into(), FieldValue::Ref("some-key".into()));
        assert_eq!(get::<String>(&data, "target"), None);
        assert_eq!(data["target"].as_ref_key(), Some("some-key"));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut data = FieldData::default();
        put(&mut data, "z", &1);
        put(&mut data, "a", &2);
        put(&mut data, "m", &3);
        let names: Vec<&str> = data.keys().map(String::as_str).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }
}
