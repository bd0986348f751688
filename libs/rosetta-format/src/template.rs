//! User-authored output templates.
//!
//! A template is free text with `{uid}`, `{lat}`, `{lon}`, `{alt}` and
//! `{timestamp}` placeholders; `{{` and `}}` produce literal braces.

use rosetta_api::{FieldOverrides, TransformError};

use crate::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Uid,
    Lat,
    Lon,
    Alt,
    Timestamp,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "uid" => Some(Placeholder::Uid),
            "lat" => Some(Placeholder::Lat),
            "lon" => Some(Placeholder::Lon),
            "alt" => Some(Placeholder::Alt),
            "timestamp" => Some(Placeholder::Timestamp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Placeholder::Uid => "uid",
            Placeholder::Lat => "lat",
            Placeholder::Lon => "lon",
            Placeholder::Alt => "alt",
            Placeholder::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

/// A parsed template, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, TransformError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(TransformError::template(format!("single '}}' at offset {pos}")));
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => {
                                return Err(TransformError::template(format!(
                                    "unclosed placeholder at offset {pos}"
                                )));
                            }
                            Some((_, ch)) => name.push(ch),
                        }
                    }
                    if name.is_empty() {
                        return Err(TransformError::template(format!("empty placeholder at offset {pos}")));
                    }
                    let field = Placeholder::from_name(&name)
                        .ok_or_else(|| TransformError::template(format!("unknown placeholder '{{{name}}}'")))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Placeholders in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder.
    ///
    /// The document must carry a `<point>` unless lat, lon and alt are all
    /// overridden, whichever placeholders the template uses.
    pub fn render(&self, doc: &Document, overrides: &FieldOverrides) -> Result<String, TransformError> {
        let point_overridden = overrides.lat.is_some() && overrides.lon.is_some() && overrides.alt.is_some();
        if doc.point().is_none() && !point_overridden {
            return Err(TransformError::template(
                "document has no <point> element and lat/lon/alt are not all overridden",
            ));
        }

        let uid = FieldOverrides::pick(&overrides.uid, doc.root().attr("uid")).unwrap_or("UNKNOWN");
        let timestamp = doc.root().attr("time").unwrap_or("UNKNOWN");
        let lat = FieldOverrides::pick(&overrides.lat, doc.point_attr("lat")).unwrap_or("0");
        let lon = FieldOverrides::pick(&overrides.lon, doc.point_attr("lon")).unwrap_or("0");
        let alt = FieldOverrides::pick(&overrides.alt, doc.point_attr("hae")).unwrap_or("0");

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Placeholder::Uid) => out.push_str(uid),
                Segment::Field(Placeholder::Lat) => out.push_str(lat),
                Segment::Field(Placeholder::Lon) => out.push_str(lon),
                Segment::Field(Placeholder::Alt) => out.push_str(alt),
                Segment::Field(Placeholder::Timestamp) => out.push_str(timestamp),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use rosetta_api::TransformErrorKind;
    use rstest::rstest;

    use super::*;

    const EVENT: &str = r#"<event uid="A1" time="T1"><point lat="1" lon="2" hae="3"/></event>"#;

    fn render(template: &str, input: &str, overrides: &FieldOverrides) -> Result<String, TransformError> {
        Template::parse(template)?.render(&Document::parse(input)?, overrides)
    }

    #[test]
    fn substitutes_every_field() {
        let out = render("{uid}|{lat}|{lon}|{alt}|{timestamp}", EVENT, &FieldOverrides::none()).unwrap();
        assert_eq!(out, "A1|1|2|3|T1");
    }

    #[test]
    fn literal_braces() {
        let out = render(r#"{{"id": "{uid}"}}"#, EVENT, &FieldOverrides::none()).unwrap();
        assert_eq!(out, r#"{"id": "A1"}"#);
    }

    #[test]
    fn overrides_apply_except_timestamp() {
        let o = FieldOverrides::none().with_uid("B2").with_lon("7").with_timestamp("T9");
        let out = render("{uid} {lon} {timestamp}", EVENT, &o).unwrap();
        assert_eq!(out, "B2 7 T1");
    }

    #[test]
    fn missing_attributes_use_defaults() {
        let out = render("{uid} {lat} {timestamp}", r#"<event><point lon="2"/></event>"#, &FieldOverrides::none())
            .unwrap();
        assert_eq!(out, "UNKNOWN 0 UNKNOWN");
    }

    #[test]
    fn missing_point_is_an_error() {
        let err = render("{uid}", r#"<event uid="A1"/>"#, &FieldOverrides::none()).unwrap_err();
        assert_eq!(err.kind, TransformErrorKind::TemplateRender);
        assert!(err.message.contains("<point>"), "{err}");
        assert!(!err.message.contains("'lat'"), "{err}");
    }

    #[test]
    fn partial_point_override_still_needs_point() {
        let o = FieldOverrides::none().with_lat("1").with_lon("2");
        let err = render("{lat},{lon}", r#"<event/>"#, &o).unwrap_err();
        assert_eq!(err.kind, TransformErrorKind::TemplateRender);
    }

    #[test]
    fn overridden_point_fields_need_no_point() {
        let o = FieldOverrides::none().with_lat("1").with_lon("2").with_alt("3");
        assert_eq!(render("{lat},{lon},{alt}", r#"<event/>"#, &o).unwrap(), "1,2,3");
    }

    #[rstest]
    #[case::unknown("{speed}")]
    #[case::empty("{}")]
    #[case::unclosed("{uid")]
    #[case::nested("{u{id}")]
    #[case::stray_close("uid}")]
    #[case::format_spec("{lat:>8}")]
    fn rejects_bad_templates(#[case] template: &str) {
        let err = Template::parse(template).unwrap_err();
        assert_eq!(err.kind, TransformErrorKind::TemplateRender, "{template}");
    }

    #[test]
    fn lists_placeholders() {
        let t = Template::parse("<a id='{uid}'>{lat}{lat}</a>").unwrap();
        let names: Vec<_> = t.placeholders().map(Placeholder::name).collect();
        assert_eq!(names, ["uid", "lat", "lat"]);
    }
}
