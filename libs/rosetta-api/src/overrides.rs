use serde::{Deserialize, Deserializer, Serialize};

/// Operator-supplied field substitutions.
///
/// A present field always wins over the value extracted from the inbound
/// document; an absent field falls back to it. Blank strings count as
/// absent. `timestamp` is carried with the rest of the set but no output
/// format currently applies it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverrides {
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl FieldOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = blank_to_none(Some(uid.into()));
        self
    }

    pub fn with_lat(mut self, lat: impl Into<String>) -> Self {
        self.lat = blank_to_none(Some(lat.into()));
        self
    }

    pub fn with_lon(mut self, lon: impl Into<String>) -> Self {
        self.lon = blank_to_none(Some(lon.into()));
        self
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = blank_to_none(Some(alt.into()));
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = blank_to_none(Some(timestamp.into()));
        self
    }

    /// Drop blank values, e.g. after filling the struct from raw input fields.
    pub fn normalized(self) -> Self {
        Self {
            uid: blank_to_none(self.uid),
            lat: blank_to_none(self.lat),
            lon: blank_to_none(self.lon),
            alt: blank_to_none(self.alt),
            timestamp: blank_to_none(self.timestamp),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uid.is_none()
            && self.lat.is_none()
            && self.lon.is_none()
            && self.alt.is_none()
            && self.timestamp.is_none()
    }

    /// Override-or-extracted lookup shared by every output format.
    pub fn pick<'a>(over: &'a Option<String>, extracted: Option<&'a str>) -> Option<&'a str> {
        over.as_deref().or(extracted)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(blank_to_none(Option::<String>::deserialize(deserializer)?))
}
