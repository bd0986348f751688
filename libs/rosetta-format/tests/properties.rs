use proptest::prelude::*;
use rosetta_api::{FieldOverrides, OutputFormat, TransformErrorKind};
use rosetta_format::{Document, transform};

fn value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9.:+-]{1,12}"
}

fn maybe_value() -> impl Strategy<Value = Option<String>> {
    prop::option::of(value())
}

/// `<event>` with every attribute optionally present.
fn event() -> impl Strategy<Value = String> {
    (maybe_value(), maybe_value(), prop::option::of((maybe_value(), maybe_value(), maybe_value()))).prop_map(
        |(uid, time, point)| {
            let attr = |k: &str, v: &Option<String>| v.as_ref().map(|v| format!(r#" {k}="{v}""#)).unwrap_or_default();
            let point = point
                .map(|(lat, lon, hae)| format!("<point{}{}{}/>", attr("lat", &lat), attr("lon", &lon), attr("hae", &hae)))
                .unwrap_or_default();
            format!("<event{}{}>{point}</event>", attr("uid", &uid), attr("time", &time))
        },
    )
}

fn overrides() -> impl Strategy<Value = FieldOverrides> {
    (maybe_value(), maybe_value(), maybe_value(), maybe_value()).prop_map(|(uid, lat, lon, alt)| FieldOverrides {
        uid,
        lat,
        lon,
        alt,
        timestamp: None,
    })
}

proptest! {
    #[test]
    fn raw_is_identity(input in event(), o in overrides()) {
        prop_assert_eq!(transform(&input, &OutputFormat::RawXml, &o).unwrap(), input);
    }

    #[test]
    fn simdis_output_is_a_fixed_point(input in event(), o in overrides()) {
        if let Ok(once) = transform(&input, &OutputFormat::SimdisXml, &o) {
            let twice = transform(&once, &OutputFormat::SimdisXml, &FieldOverrides::none()).unwrap();
            prop_assert_eq!(twice, once);
        }
    }

    #[test]
    fn overrides_always_win(input in event(), o in overrides()) {
        let json = transform(&input, &OutputFormat::Json, &o).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        for (key, over) in [("uid", &o.uid), ("lat", &o.lat), ("lon", &o.lon), ("alt", &o.alt)] {
            if let Some(over) = over {
                prop_assert_eq!(v[key].as_str(), Some(over.as_str()));
            }
        }

        let cot = transform(&input, &OutputFormat::CotXml, &o).unwrap();
        let doc = Document::parse(&cot).unwrap();
        if let Some(uid) = &o.uid {
            prop_assert_eq!(doc.root().attr("uid"), Some(uid.as_str()));
        }
        for (attr, over) in [("lat", &o.lat), ("lon", &o.lon), ("hae", &o.alt)] {
            if let Some(over) = over {
                prop_assert_eq!(doc.point_attr(attr), Some(over.as_str()));
            }
        }

        if let Ok(simdis) = transform(&input, &OutputFormat::SimdisXml, &o) {
            let doc = Document::parse(&simdis).unwrap();
            let platform = doc.root();
            prop_assert_eq!(platform.name(), "simdis");
            let platform_doc = Document::parse(simdis.trim_start_matches("<simdis>").trim_end_matches("</simdis>")).unwrap();
            for (attr, over) in [("id", &o.uid), ("lat", &o.lat), ("lon", &o.lon), ("alt", &o.alt)] {
                if let Some(over) = over {
                    prop_assert_eq!(platform_doc.root().attr(attr), Some(over.as_str()));
                }
            }
        }
    }

    #[test]
    fn simdis_fails_iff_a_field_is_unset(input in event(), o in overrides()) {
        let doc = Document::parse(&input).unwrap();
        let unset = o.uid.is_none() && doc.root().attr("uid").is_none()
            || doc.root().attr("time").is_none()
            || o.lat.is_none() && doc.point_attr("lat").is_none()
            || o.lon.is_none() && doc.point_attr("lon").is_none()
            || o.alt.is_none() && doc.point_attr("hae").is_none();

        match transform(&input, &OutputFormat::SimdisXml, &o) {
            Ok(_) => prop_assert!(!unset),
            Err(e) => {
                prop_assert!(unset);
                prop_assert_eq!(e.kind, TransformErrorKind::MissingField);
            }
        }
        prop_assert!(transform(&input, &OutputFormat::CotXml, &o).is_ok());
        prop_assert!(transform(&input, &OutputFormat::Json, &o).is_ok());
    }
}
