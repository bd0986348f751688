use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use rosetta_api::TransformError;

/// One element's tag name and unescaped attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value; an empty value counts as absent.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, TransformError> {
        check_start_tag(utf8(start)?)?;
        let name = utf8(start.name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| TransformError::parse(format!("<{name}>: {e}")))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| TransformError::parse(format!("<{name} {key}>: {e}")))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self { name, attributes })
    }
}

/// The parts of a well-formed document the encoders read: the root element
/// and its first direct `<point>` child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
    point: Option<Element>,
}

impl Document {
    /// Parse the whole (trimmed) input. Fails unless it is exactly one
    /// well-formed element tree.
    pub fn parse(input: &str) -> Result<Self, TransformError> {
        let mut reader = Reader::from_str(input.trim());

        let mut open: Vec<String> = Vec::new();
        let mut root: Option<Element> = None;
        let mut point: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                TransformError::parse(format!("at byte {}: {e}", reader.error_position()))
            })?;

            match event {
                Event::Start(start) | Event::Empty(start) if root.is_some() && open.is_empty() => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    return Err(TransformError::parse(format!("second root element <{name}>")));
                }
                Event::Start(start) => {
                    let element = Element::from_start(&start)?;
                    let name = element.name.clone();
                    Self::place(element, open.len(), &mut root, &mut point);
                    open.push(name);
                }
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    Self::place(element, open.len(), &mut root, &mut point);
                }
                Event::End(end) => {
                    let end_name = end.name();
                    let name = utf8(end_name.as_ref())?;
                    match open.pop() {
                        Some(expected) if expected == name => {}
                        Some(expected) => {
                            return Err(TransformError::parse(format!(
                                "mismatched end tag </{name}>, expected </{expected}>"
                            )));
                        }
                        None => {
                            return Err(TransformError::parse(format!("unexpected end tag </{name}>")));
                        }
                    }
                }
                Event::Text(text) => {
                    if open.is_empty() && !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(TransformError::parse("text outside of the root element"));
                    }
                    text.unescape()
                        .map_err(|e| TransformError::parse(format!("at byte {}: {e}", reader.buffer_position())))?;
                }
                Event::CData(_) if open.is_empty() => {
                    return Err(TransformError::parse("CDATA outside of the root element"));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(TransformError::parse(format!("unclosed element <{unclosed}>")));
        }
        let root = root.ok_or_else(|| TransformError::parse("no root element"))?;
        Ok(Self { root, point })
    }

    fn place(element: Element, depth: usize, root: &mut Option<Element>, point: &mut Option<Element>) {
        match depth {
            0 => *root = Some(element),
            1 if point.is_none() && element.name == "point" => *point = Some(element),
            _ => {}
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    pub fn point(&self) -> Option<&Element> {
        self.point.as_ref()
    }

    pub fn point_attr(&self, key: &str) -> Option<&str> {
        self.point.as_ref().and_then(|p| p.attr(key))
    }
}

/// Strict check of a start tag's text (between `<` and `>` or `/>`):
/// valid names, whitespace before every attribute, quoted values with no
/// raw `<`.
fn check_start_tag(tag: &str) -> Result<(), TransformError> {
    let bad = |what: String| Err(TransformError::parse(format!("<{tag}>: {what}")));

    let mut rest = tag;
    let name_len = name_len(rest);
    if name_len == 0 {
        return bad("invalid element name".into());
    }
    rest = &rest[name_len..];

    loop {
        let trimmed = rest.trim_start_matches(is_xml_space);
        if trimmed.is_empty() {
            return Ok(());
        }
        if trimmed.len() == rest.len() {
            return bad("missing whitespace between attributes".into());
        }
        rest = trimmed;

        let key_len = self::name_len(rest);
        if key_len == 0 {
            return bad("invalid attribute name".into());
        }
        let key = &rest[..key_len];
        rest = rest[key_len..].trim_start_matches(is_xml_space);

        let Some(after_eq) = rest.strip_prefix('=') else {
            return bad(format!("attribute '{key}' has no value"));
        };
        rest = after_eq.trim_start_matches(is_xml_space);

        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            return bad(format!("attribute '{key}' value is not quoted"));
        };
        let Some(end) = rest[1..].find(quote) else {
            return bad(format!("attribute '{key}' value is not terminated"));
        };
        if rest[1..=end].contains('<') {
            return bad(format!("'<' in value of attribute '{key}'"));
        }
        rest = &rest[end + 2..];
    }
}

/// Byte length of the XML Name at the start of `s`, 0 when there is none.
fn name_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_name_start(c) => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !is_name_char(*c))
        .map_or(s.len(), |(i, _)| i)
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || (!c.is_ascii() && c.is_alphabetic())
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-' || c == '.' || (!c.is_ascii() && c.is_alphanumeric())
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn utf8(bytes: &[u8]) -> Result<&str, TransformError> {
    std::str::from_utf8(bytes).map_err(|e| TransformError::parse(format!("invalid UTF-8 name: {e}")))
}
