use quick_xml::escape::escape;

use rosetta_api::{FieldOverrides, TransformError};

use crate::document::Document;
use crate::fields::Fields;

const COT_TYPE: &str = "a-f-G-U-C";
const COT_HOW: &str = "m-g";
/// Circular/linear error: precision unknown.
const UNKNOWN_PRECISION: &str = "9999999.0";

/// Cursor-on-Target `<event>`. Never fails on missing fields.
pub(crate) fn encode(doc: &Document, overrides: &FieldOverrides) -> Result<String, TransformError> {
    if doc.root_name() != "event" {
        return Err(TransformError::unexpected_root(format!(
            "expected <event> root element, found <{}>",
            doc.root_name()
        )));
    }

    let fields = Fields::resolve(doc, overrides);
    let uid = escape(fields.uid.unwrap_or("UNKNOWN"));
    let time = escape(fields.timestamp.unwrap_or("UNKNOWN"));
    let lat = escape(fields.lat.unwrap_or("0.0"));
    let lon = escape(fields.lon.unwrap_or("0.0"));
    let hae = escape(fields.alt.unwrap_or("0.0"));

    Ok(format!(
        r#"<event version="2.0" uid="{uid}" type="{COT_TYPE}" how="{COT_HOW}" time="{time}" start="{time}" stale="{time}"><point lat="{lat}" lon="{lon}" hae="{hae}" ce="{UNKNOWN_PRECISION}" le="{UNKNOWN_PRECISION}" /></event>"#
    ))
}
