//! Inbound event document → output representation.
//!
//! Every format goes through the same two steps: a well-formedness pass
//! over the whole input ([`document`]), then one encoder. Nothing here does
//! I/O or logs; failures come back as [`TransformError`].

mod cot;
mod document;
mod fields;
mod json;
mod simdis;
pub mod template;

use rosetta_api::{FieldOverrides, OutputFormat, TransformError};

pub use document::{Document, Element};
pub use template::Template;

/// Transform `input` into `format`, applying `overrides`.
///
/// Raw XML ignores the overrides and returns the input unchanged once it
/// is known to be well-formed.
pub fn transform(
    input: &str,
    format: &OutputFormat,
    overrides: &FieldOverrides,
) -> Result<String, TransformError> {
    let doc = Document::parse(input)?;
    match format {
        OutputFormat::RawXml => Ok(input.to_string()),
        OutputFormat::SimdisXml => simdis::encode(input, &doc, overrides),
        OutputFormat::CotXml => cot::encode(&doc, overrides),
        OutputFormat::Json => json::encode(&doc, overrides),
        OutputFormat::CustomTemplate(text) => Template::parse(text)?.render(&doc, overrides),
    }
}

#[cfg(test)]
mod tests {
    use rosetta_api::TransformErrorKind;

    use super::*;

    const EVENT: &str = r#"<event uid="A1" time="T1"><point lat="1" lon="2" hae="3"/></event>"#;

    #[test]
    fn raw_is_identity() {
        let padded = format!("\n  {EVENT}\n");
        assert_eq!(transform(&padded, &OutputFormat::RawXml, &FieldOverrides::none()).unwrap(), padded);
    }

    #[test]
    fn raw_ignores_overrides() {
        let o = FieldOverrides::none().with_uid("B2");
        assert_eq!(transform(EVENT, &OutputFormat::RawXml, &o).unwrap(), EVENT);
    }

    #[test]
    fn malformed_input_fails_for_every_format() {
        let formats = [
            OutputFormat::SimdisXml,
            OutputFormat::CotXml,
            OutputFormat::Json,
            OutputFormat::RawXml,
            OutputFormat::CustomTemplate("{uid}".into()),
        ];
        for format in &formats {
            let err = transform("not xml", format, &FieldOverrides::none()).unwrap_err();
            assert_eq!(err.kind, TransformErrorKind::Parse, "{format}");
        }
    }

    #[test]
    fn template_dispatch() {
        let format = OutputFormat::CustomTemplate("{uid}@{lat},{lon}".into());
        assert_eq!(transform(EVENT, &format, &FieldOverrides::none()).unwrap(), "A1@1,2");
    }
}
