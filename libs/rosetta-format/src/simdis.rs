use quick_xml::escape::escape;

use rosetta_api::{FieldOverrides, TransformError};

use crate::document::Document;
use crate::fields::Fields;

/// `<simdis><platform id lat lon alt time/></simdis>`.
///
/// A document already rooted at `<simdis>` passes through unchanged, so
/// Simdis output is a fixed point. Unlike the other encoders every field
/// is mandatory.
pub(crate) fn encode(input: &str, doc: &Document, overrides: &FieldOverrides) -> Result<String, TransformError> {
    match doc.root_name() {
        "simdis" => return Ok(input.trim().to_string()),
        "event" => {}
        other => {
            return Err(TransformError::unexpected_root(format!(
                "expected <event> root element, found <{other}>"
            )));
        }
    }

    let fields = Fields::resolve(doc, overrides);
    let (Some(uid), Some(timestamp), Some(lat), Some(lon), Some(alt)) =
        (fields.uid, fields.timestamp, fields.lat, fields.lon, fields.alt)
    else {
        return Err(TransformError::missing_field(format!(
            "missing {}",
            fields.missing().join(", ")
        )));
    };

    Ok(format!(
        r#"<simdis>  <platform id="{}" lat="{}" lon="{}" alt="{}" time="{}"/></simdis>"#,
        escape(uid),
        escape(lat),
        escape(lon),
        escape(alt),
        escape(timestamp),
    ))
}
