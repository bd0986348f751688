use std::fmt;
use std::str::FromStr;

/// Output representation selected per pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `<simdis><platform .../></simdis>`
    #[default]
    SimdisXml,
    /// Cursor-on-Target `<event>` with a nested `<point>`.
    CotXml,
    /// Flat `{uid, timestamp, lat, lon, alt}` object.
    Json,
    /// Inbound document, unchanged.
    RawXml,
    /// User-authored text with `{field}` placeholders.
    CustomTemplate(String),
}

impl OutputFormat {
    /// Resolve a format name. `template` is required for the template
    /// format and ignored by the others.
    pub fn from_name(name: &str, template: Option<String>) -> Result<Self, String> {
        let key: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "simdis" | "simdisxml" => Ok(OutputFormat::SimdisXml),
            "cot" | "cotxml" => Ok(OutputFormat::CotXml),
            "json" => Ok(OutputFormat::Json),
            "raw" | "rawxml" => Ok(OutputFormat::RawXml),
            "template" | "customtemplate" => match template {
                Some(t) if !t.is_empty() => Ok(OutputFormat::CustomTemplate(t)),
                _ => Err("format 'template' needs a template".into()),
            },
            _ => Err(format!("unsupported format '{name}'")),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::SimdisXml => "Simdis XML",
            OutputFormat::CotXml => "CoT XML",
            OutputFormat::Json => "JSON",
            OutputFormat::RawXml => "Raw XML",
            OutputFormat::CustomTemplate(_) => "Custom Template",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s, None)
    }
}
