//! The persisted RSS document.
//!
//! A [`Channel`] keeps every non-item child of `<channel>` as the exact markup
//! it was read with, so metadata survives any number of merges unchanged.
//! Items are kept as markup too, alongside the `title` and `link` text the
//! duplicate check needs.
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <rss version="2.0">
//!   <channel>
//!     <generator>Sitefeed</generator>
//!     <title>..</title> <description>..</description> <link>..</link>
//!     <image>..</image>            (optional)
//!     <timeStamp>..</timeStamp>    (last query, RFC 3339)
//!     <item>..</item>              (newest first)
//!   </channel>
//! </rss>
//! ```

use crate::error::SitefeedError;
use crate::models::{Post, TOOL_NAME};
use chrono::{DateTime, FixedOffset, Utc};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const TIME_STAMP: &str = "timeStamp";

/// Channel image shown by feed readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelImage {
    pub title: String,
    pub link: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MetadataNode {
    name: String,
    text: String,
    markup: String,
}

/// One `<item>` of a persisted channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelItem {
    /// Text of the `title` child, `None` when the element is missing.
    pub title: Option<String>,
    pub link: Option<String>,
    /// The item exactly as stored.
    pub markup: String,
}

impl ChannelItem {
    /// Serialize a post as an `<item>` element.
    pub fn from_post(post: &Post) -> Result<Self, SitefeedError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .map_err(SitefeedError::xml)?;
        write_text_element(&mut writer, "title", &post.title)?;
        write_text_element(&mut writer, "pubDate", &post.pub_date)?;
        write_text_element(&mut writer, "description", &post.description)?;
        write_text_element(&mut writer, "link", &post.link)?;
        if let Some(guid) = &post.guid {
            write_text_element(&mut writer, "guid", guid)?;
        }
        if let Some(author) = &post.author {
            write_text_element(&mut writer, "author", author)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .map_err(SitefeedError::xml)?;

        Ok(Self {
            title: Some(post.title.clone()),
            link: Some(post.link.clone()),
            markup: into_string(writer)?,
        })
    }

    fn parse(markup: &str) -> Result<Self, SitefeedError> {
        Ok(Self {
            title: element_text(markup, Some("title"))?,
            link: element_text(markup, Some("link"))?,
            markup: markup.to_string(),
        })
    }
}

/// Channel metadata plus retained items, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    root_open: String,
    root_name: String,
    metadata: Vec<MetadataNode>,
    items: Vec<ChannelItem>,
}

impl Channel {
    /// A fresh channel whose last query is the epoch.
    pub fn new(
        title: &str,
        description: &str,
        link: &str,
        image: Option<&ChannelImage>,
    ) -> Result<Self, SitefeedError> {
        let mut metadata = vec![
            text_node("generator", TOOL_NAME)?,
            text_node("title", title)?,
            text_node("description", description)?,
            text_node("link", link)?,
        ];
        if let Some(image) = image {
            let mut writer = Writer::new(Vec::new());
            writer
                .write_event(Event::Start(BytesStart::new("image")))
                .map_err(SitefeedError::xml)?;
            write_text_element(&mut writer, "title", &image.title)?;
            write_text_element(&mut writer, "link", &image.link)?;
            write_text_element(&mut writer, "url", &image.url)?;
            writer
                .write_event(Event::End(BytesEnd::new("image")))
                .map_err(SitefeedError::xml)?;
            metadata.push(MetadataNode {
                name: "image".to_string(),
                text: format!("{}{}{}", image.title, image.link, image.url),
                markup: into_string(writer)?,
            });
        }
        metadata.push(text_node(TIME_STAMP, &DateTime::<Utc>::UNIX_EPOCH.to_rfc3339())?);

        Ok(Self {
            root_open: r#"<rss version="2.0">"#.to_string(),
            root_name: "rss".to_string(),
            metadata,
            items: Vec::new(),
        })
    }

    /// Read a persisted document. `file` only names the document in errors.
    pub fn parse(xml: &str, file: &str) -> Result<Self, SitefeedError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut root: Option<(String, String)> = None;
        let mut in_channel = false;
        let mut metadata = Vec::new();
        let mut items = Vec::new();

        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event().map_err(SitefeedError::xml)? {
                Event::Start(e) if root.is_none() => {
                    let after = reader.buffer_position() as usize;
                    root = Some((slice(xml, before, after)?.to_string(), qname(&e)));
                }
                Event::Start(e) if !in_channel => {
                    if e.name().as_ref() == b"channel" {
                        in_channel = true;
                    } else {
                        reader.read_to_end(e.name()).map_err(SitefeedError::xml)?;
                    }
                }
                Event::Start(e) => {
                    let name = qname(&e);
                    reader.read_to_end(e.name()).map_err(SitefeedError::xml)?;
                    let markup = slice(xml, before, reader.buffer_position() as usize)?;
                    push_child(name, markup, &mut metadata, &mut items)?;
                }
                Event::Empty(e) if in_channel => {
                    let markup = slice(xml, before, reader.buffer_position() as usize)?;
                    push_child(qname(&e), markup, &mut metadata, &mut items)?;
                }
                Event::End(e) if in_channel && e.name().as_ref() == b"channel" => break,
                Event::Eof => break,
                _ => {}
            }
        }

        match root {
            Some((root_open, root_name)) if in_channel => Ok(Self {
                root_open,
                root_name,
                metadata,
                items,
            }),
            _ => Err(SitefeedError::MissingChannel {
                file: file.to_string(),
            }),
        }
    }

    /// Serialize the whole document; metadata first, items last.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(XML_DECL);
        out.push('\n');
        out.push_str(&self.root_open);
        out.push_str("\n  <channel>\n");
        let children = self
            .metadata
            .iter()
            .map(|m| &m.markup)
            .chain(self.items.iter().map(|i| &i.markup));
        for markup in children {
            out.push_str("    ");
            out.push_str(markup);
            out.push('\n');
        }
        out.push_str("  </channel>\n</");
        out.push_str(&self.root_name);
        out.push_str(">\n");
        out
    }

    /// Raw text of the `timeStamp` element, if present.
    pub fn time_stamp(&self) -> Option<&str> {
        self.metadata_text(TIME_STAMP)
    }

    /// Replace (or append) the `timeStamp` element.
    pub fn set_time_stamp(&mut self, at: &DateTime<FixedOffset>) -> Result<(), SitefeedError> {
        let node = text_node(TIME_STAMP, &at.to_rfc3339())?;
        match self.metadata.iter_mut().find(|m| m.name == TIME_STAMP) {
            Some(existing) => *existing = node,
            None => self.metadata.push(node),
        }
        Ok(())
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata_text("title")
    }

    pub fn items(&self) -> &[ChannelItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ChannelItem> {
        &mut self.items
    }

    fn metadata_text(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.text.as_str())
    }
}

fn push_child(
    name: String,
    markup: &str,
    metadata: &mut Vec<MetadataNode>,
    items: &mut Vec<ChannelItem>,
) -> Result<(), SitefeedError> {
    if name == "item" {
        items.push(ChannelItem::parse(markup)?);
    } else {
        metadata.push(MetadataNode {
            text: element_text(markup, None)?.unwrap_or_default(),
            name,
            markup: markup.to_string(),
        });
    }
    Ok(())
}

fn qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn slice(xml: &str, from: usize, to: usize) -> Result<&str, SitefeedError> {
    xml.get(from..to)
        .map(str::trim)
        .ok_or_else(|| SitefeedError::Xml(format!("reader position {from}..{to} out of bounds")))
}

/// Text content of `markup`'s root element, or of its first `child` element.
///
/// Entity references are resolved; unknown ones are kept verbatim.
fn element_text(markup: &str, child: Option<&str>) -> Result<Option<String>, SitefeedError> {
    let target = if child.is_some() { 2 } else { 1 };
    let matches = |e: &BytesStart<'_>| child.is_none_or(|c| e.name().as_ref() == c.as_bytes());

    let mut reader = Reader::from_str(markup);
    let mut depth = 0usize;
    let mut capture: Option<String> = None;
    loop {
        match reader.read_event().map_err(SitefeedError::xml)? {
            Event::Start(e) => {
                depth += 1;
                if capture.is_none() && depth == target && matches(&e) {
                    capture = Some(String::new());
                }
            }
            Event::Empty(e) => {
                if capture.is_none() && depth + 1 == target && matches(&e) {
                    return Ok(Some(String::new()));
                }
            }
            Event::End(_) => {
                if depth == target && capture.is_some() {
                    return Ok(capture);
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(t) => {
                if let Some(text) = capture.as_mut() {
                    let raw = std::str::from_utf8(&t).map_err(SitefeedError::xml)?;
                    match unescape(raw) {
                        Ok(decoded) => text.push_str(&decoded),
                        Err(_) => text.push_str(raw),
                    }
                }
            }
            Event::CData(c) => {
                if let Some(text) = capture.as_mut() {
                    text.push_str(std::str::from_utf8(&c).map_err(SitefeedError::xml)?);
                }
            }
            Event::GeneralRef(r) => {
                if let Some(text) = capture.as_mut() {
                    let entity = format!("&{};", std::str::from_utf8(&r).map_err(SitefeedError::xml)?);
                    match unescape(&entity) {
                        Ok(decoded) => text.push_str(&decoded),
                        Err(_) => text.push_str(&entity),
                    }
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), SitefeedError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(SitefeedError::xml)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(SitefeedError::xml)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(SitefeedError::xml)?;
    Ok(())
}

fn text_node(name: &str, text: &str) -> Result<MetadataNode, SitefeedError> {
    let mut writer = Writer::new(Vec::new());
    write_text_element(&mut writer, name, text)?;
    Ok(MetadataNode {
        name: name.to_string(),
        text: text.to_string(),
        markup: into_string(writer)?,
    })
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, SitefeedError> {
    String::from_utf8(writer.into_inner()).map_err(SitefeedError::xml)
}
