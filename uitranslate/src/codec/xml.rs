//! Android-style `strings.xml` ⇄ flat key mapping
//!
//! Only `<string name="KEY">VALUE</string>` elements are read, at any depth
//! below the root. Inline markup inside a value is dropped but its text is
//! kept, so `<string name="a">Hello <b>you</b></string>` reads as `Hello you`.

use crate::error::CodecError;
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const ROOT_TAG: &str = "resources";
const STRING_TAG: &str = "string";
const NAME_ATTRIBUTE: &[u8] = b"name";

/// A `<string>` element currently being read
struct OpenString {
    name: Option<String>,
    text: String,
    /// Nesting depth of inline markup inside the element
    depth: usize,
}

/// Read every named `<string>` element into a key → text mapping
pub fn xml_to_map(xml: &str) -> Result<IndexMap<String, String>, CodecError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = IndexMap::new();
    let mut current: Option<OpenString> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(element) => match current.as_mut() {
                Some(open) => open.depth += 1,
                None if element.name().as_ref() == STRING_TAG.as_bytes() => {
                    current = Some(OpenString {
                        name: name_attribute(&element)?,
                        text: String::new(),
                        depth: 0,
                    });
                }
                None => {}
            },
            Event::Empty(element) => {
                if current.is_none() && element.name().as_ref() == STRING_TAG.as_bytes() {
                    if let Some(name) = name_attribute(&element)? {
                        strings.insert(name, String::new());
                    }
                }
            }
            Event::End(_) => {
                let closes = match current.as_mut() {
                    Some(open) if open.depth > 0 => {
                        open.depth -= 1;
                        false
                    }
                    Some(_) => true,
                    None => false,
                };
                if closes {
                    if let Some(OpenString {
                        name: Some(name),
                        text,
                        ..
                    }) = current.take()
                    {
                        strings.insert(name, text);
                    }
                }
            }
            Event::Text(text) => {
                if let Some(open) = current.as_mut() {
                    open.text.push_str(&text.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(data) => {
                if let Some(open) = current.as_mut() {
                    open.text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(CodecError::Xml(
            "unexpected end of document inside <string>".to_string(),
        ));
    }

    Ok(strings)
}

fn name_attribute(element: &BytesStart<'_>) -> Result<Option<String>, CodecError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        if attribute.key.as_ref() == NAME_ATTRIBUTE {
            let value = attribute.unescape_value().map_err(xml_error)?;
            if value.is_empty() {
                return Ok(None);
            }
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Write a key → text mapping as a `strings.xml` document
pub fn map_to_xml<'a, I>(strings: I) -> Result<String, CodecError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new(ROOT_TAG)))
        .map_err(xml_error)?;

    for (name, value) in strings {
        writer
            .create_element(STRING_TAG)
            .with_attribute(("name", name.as_str()))
            .write_text_content(BytesText::new(value))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT_TAG)))
        .map_err(xml_error)?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

/// Turn a dot-path key into a valid Android resource name
pub fn android_resource_name(key: &str) -> String {
    key.replace('.', "_")
}

fn xml_error(err: impl std::fmt::Display) -> CodecError {
    CodecError::Xml(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name">Notes</string>
    <string name="greeting">Hello, <b>%1$s</b>!</string>
    <string name="terms">Read &amp; accept</string>
    <string>no name</string>
    <string name="empty"/>
    <string name="raw"><![CDATA[<i>kept</i>]]></string>
</resources>"#;

    #[test]
    fn test_xml_to_map_reads_named_strings() {
        let map = xml_to_map(SAMPLE).unwrap();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec!["app_name", "greeting", "terms", "empty", "raw"]
        );
        assert_eq!(map["app_name"], "Notes");
        assert_eq!(map["empty"], "");
    }

    #[test]
    fn test_xml_to_map_flattens_inline_markup() {
        let map = xml_to_map(SAMPLE).unwrap();
        assert_eq!(map["greeting"], "Hello, %1$s!");
    }

    #[test]
    fn test_xml_to_map_unescapes_entities_and_cdata() {
        let map = xml_to_map(SAMPLE).unwrap();
        assert_eq!(map["terms"], "Read & accept");
        assert_eq!(map["raw"], "<i>kept</i>");
    }

    #[test]
    fn test_xml_to_map_nested_containers() {
        let xml = r#"<resources><group><string name="deep">Deep</string></group></resources>"#;
        let map = xml_to_map(xml).unwrap();
        assert_eq!(map["deep"], "Deep");
    }

    #[test]
    fn test_xml_to_map_malformed() {
        let err = xml_to_map("<resources><string name=\"a\">open</resources>").unwrap_err();
        assert!(matches!(err, CodecError::Xml(_)));
    }

    #[test]
    fn test_map_to_xml_escapes_and_round_trips() {
        let mut map = IndexMap::new();
        map.insert("title".to_string(), "Fish & <Chips>".to_string());
        map.insert("quote".to_string(), "Say \"hi\"".to_string());
        map.insert("blank".to_string(), String::new());

        let xml = map_to_xml(&map).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<resources>"));
        assert!(xml.contains("Fish &amp; &lt;Chips&gt;"));
        assert_eq!(xml_to_map(&xml).unwrap(), map);
    }

    #[test]
    fn test_android_resource_name() {
        assert_eq!(android_resource_name("home.menu.open"), "home_menu_open");
        assert_eq!(android_resource_name("plain"), "plain");
    }
}
