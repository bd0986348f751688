use rosetta_api::{FieldOverrides, OutputFormat, TransformErrorKind};
use rosetta_format::transform;
use rstest::rstest;

const EVENT: &str = r#"<event uid="A1" time="T1"><point lat="1" lon="2" hae="3"/></event>"#;

#[test]
fn event_to_simdis() {
    let out = transform(EVENT, &OutputFormat::SimdisXml, &FieldOverrides::none()).unwrap();
    assert_eq!(out, r#"<simdis>  <platform id="A1" lat="1" lon="2" alt="3" time="T1"/></simdis>"#);
}

#[test]
fn event_to_json_with_alt_override() {
    let out = transform(EVENT, &OutputFormat::Json, &FieldOverrides::none().with_alt("999")).unwrap();
    let v: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        v,
        serde_json::json!({"uid": "A1", "timestamp": "T1", "lat": "1", "lon": "2", "alt": "999"})
    );
}

#[rstest]
#[case(OutputFormat::SimdisXml)]
#[case(OutputFormat::CotXml)]
#[case(OutputFormat::Json)]
#[case(OutputFormat::RawXml)]
#[case(OutputFormat::CustomTemplate("{uid}".into()))]
fn not_xml_is_a_parse_error(#[case] format: OutputFormat) {
    let err = transform("not xml", &format, &FieldOverrides::none()).unwrap_err();
    assert_eq!(err.kind, TransformErrorKind::Parse);
}

#[rstest]
fn loose_markup_is_a_parse_error(
    #[values(OutputFormat::SimdisXml, OutputFormat::CotXml, OutputFormat::Json, OutputFormat::RawXml)]
    format: OutputFormat,
    #[values(r#"<event uid="a<b"/>"#, "<1event/>", r#"<event a="1"b="2"/>"#)] input: &str,
) {
    let err = transform(input, &format, &FieldOverrides::none()).unwrap_err();
    assert_eq!(err.kind, TransformErrorKind::Parse, "{format} {input}");
}

#[test]
fn template_renders_a_custom_envelope() {
    let template = r#"<track id="{uid}" at="{timestamp}"><pos>{lat} {lon} {alt}</pos></track>"#;
    let out = transform(
        EVENT,
        &OutputFormat::CustomTemplate(template.into()),
        &FieldOverrides::none().with_lat("45.5"),
    )
    .unwrap();
    assert_eq!(out, r#"<track id="A1" at="T1"><pos>45.5 2 3</pos></track>"#);
}

#[test]
fn template_error_carries_cause() {
    let err = transform(
        r#"<event uid="A1" time="T1"/>"#,
        &OutputFormat::CustomTemplate("{lat}".into()),
        &FieldOverrides::none(),
    )
    .unwrap_err();
    assert_eq!(err.kind, TransformErrorKind::TemplateRender);
    assert!(err.to_string().contains("point"), "{err}");
}
