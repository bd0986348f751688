use serde_json::{Map, Value};

use rosetta_api::{FieldOverrides, TransformError};

use crate::document::Document;
use crate::fields::Fields;

/// Flat JSON object, 2-space indented. Accepts any root; only an `<event>`
/// root contributes its `uid`.
pub(crate) fn encode(doc: &Document, overrides: &FieldOverrides) -> Result<String, TransformError> {
    let extracted_uid = (doc.root_name() == "event").then(|| doc.root().attr("uid")).flatten();
    let fields = Fields::resolve_with_uid(doc, overrides, extracted_uid);

    let mut record = Map::new();
    for (key, value) in [
        ("uid", fields.uid.unwrap_or("UNKNOWN")),
        ("timestamp", fields.timestamp.unwrap_or("UNKNOWN")),
        ("lat", fields.lat.unwrap_or("0")),
        ("lon", fields.lon.unwrap_or("0")),
        ("alt", fields.alt.unwrap_or("0")),
    ] {
        record.insert(key.to_string(), Value::String(value.to_string()));
    }
    // Alternate Display is the 2-space pretty printer and cannot fail.
    Ok(format!("{:#}", Value::Object(record)))
}
