use rosetta_api::FieldOverrides;

use crate::document::Document;

/// Field values after the override-or-extract rule, before any
/// format-specific defaulting.
///
/// `uid`, `lat`, `lon` and `alt` take the override when one is set; `alt`
/// is sourced from the point's `hae`. `timestamp` always comes from the
/// root's `time` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fields<'a> {
    pub uid: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub lat: Option<&'a str>,
    pub lon: Option<&'a str>,
    pub alt: Option<&'a str>,
}

impl<'a> Fields<'a> {
    pub fn resolve(doc: &'a Document, overrides: &'a FieldOverrides) -> Self {
        Self::resolve_with_uid(doc, overrides, doc.root().attr("uid"))
    }

    /// Same rule, with the extracted uid supplied by the caller.
    pub fn resolve_with_uid(doc: &'a Document, overrides: &'a FieldOverrides, uid: Option<&'a str>) -> Self {
        Self {
            uid: FieldOverrides::pick(&overrides.uid, uid),
            timestamp: doc.root().attr("time"),
            lat: FieldOverrides::pick(&overrides.lat, doc.point_attr("lat")),
            lon: FieldOverrides::pick(&overrides.lon, doc.point_attr("lon")),
            alt: FieldOverrides::pick(&overrides.alt, doc.point_attr("hae")),
        }
    }

    /// Names of the fields still unset.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("uid", self.uid),
            ("timestamp", self.timestamp),
            ("lat", self.lat),
            ("lon", self.lon),
            ("alt", self.alt),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_field_by_field() {
        let doc = Document::parse(r#"<event uid="A1" time="T1"><point lat="1" lon="2" hae="3"/></event>"#).unwrap();
        let o = FieldOverrides::none().with_uid("B2").with_alt("999").with_timestamp("T9");
        let f = Fields::resolve(&doc, &o);
        assert_eq!(f.uid, Some("B2"));
        assert_eq!(f.lat, Some("1"));
        assert_eq!(f.alt, Some("999"));
        assert_eq!(f.timestamp, Some("T1"));
        assert!(f.missing().is_empty());
    }

    #[test]
    fn reports_missing() {
        let doc = Document::parse(r#"<event time="T1"/>"#).unwrap();
        let o = FieldOverrides::none().with_lon("5");
        assert_eq!(Fields::resolve(&doc, &o).missing(), vec!["uid", "lat", "alt"]);
    }
}
