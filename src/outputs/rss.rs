//! Assembly and serialization of the enriched RSS 2.0 document.
//!
//! The document is written event by event through `quick_xml::Writer`, so
//! escaping and nesting are the writer's job. Nothing is spliced into
//! previously serialized text.
//!
//! # Output shape
//!
//! ```text
//! rss (version 2.0, media/content/atom/dc namespaces)
//! └── channel: title, link, description, language, lastBuildDate,
//!     generator, atom:link rel="self"
//!     └── item*: title, link, description, guid, pubDate, dc:creator?,
//!         category*, content:encoded (CDATA)?, media:content*
//! ```

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;
use std::io::Write;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::{ChannelMeta, ExtractedContent, MediaItem, OutputFeed, OutputItem, SourceItem};

/// Namespace URIs declared on the root element.
pub const NS_MEDIA: &str = "http://search.yahoo.com/mrss/";
pub const NS_CONTENT: &str = "http://purl.org/rss/1.0/modules/content/";
pub const NS_ATOM: &str = "http://www.w3.org/2005/Atom";
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";

/// Timestamp format used for `pubDate` and `lastBuildDate`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc2822()
}

/// Pair every source item with its content and media. Items with nothing
/// extracted are still emitted; missing dates become `now`.
///
/// # Arguments
///
/// * `source_items` - Cleaned upstream items, in feed order
/// * `contents` - Extracted bodies keyed by item link
/// * `media_by_link` - Images keyed by item link
/// * `channel` - Channel metadata for the document
/// * `now` - Build time, also the fallback publish date
///
/// # Returns
///
/// The document model, one [`OutputItem`] per source item in the same order.
pub fn assemble(
    source_items: &[SourceItem],
    contents: &HashMap<String, ExtractedContent>,
    media_by_link: &HashMap<String, Vec<MediaItem>>,
    channel: ChannelMeta,
    now: DateTime<Utc>,
) -> OutputFeed {
    let items = source_items
        .iter()
        .map(|source| {
            let (guid, guid_is_permalink) = match &source.guid {
                Some(guid) => (guid.clone(), *guid == source.link),
                None => (source.link.clone(), true),
            };
            OutputItem {
                title: source.title.clone(),
                link: source.link.clone(),
                description: source.description.clone(),
                guid,
                guid_is_permalink,
                published_at: source.published_at.unwrap_or(now),
                creator: source.creator.clone(),
                categories: source.categories.clone(),
                content_html: contents
                    .get(&source.link)
                    .map(|c| c.html.clone())
                    .unwrap_or_default(),
                media: media_by_link.get(&source.link).cloned().unwrap_or_default(),
            }
        })
        .collect();

    OutputFeed {
        channel,
        last_build: now,
        items,
    }
}

/// Serialize the whole document to UTF-8 bytes.
///
/// # Errors
///
/// Returns an error only if the underlying writer fails.
#[instrument(level = "info", skip_all, fields(items = feed.items.len()))]
pub fn serialize(feed: &OutputFeed) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let rss = BytesStart::new("rss").with_attributes([
        ("version", "2.0"),
        ("xmlns:media", NS_MEDIA),
        ("xmlns:content", NS_CONTENT),
        ("xmlns:atom", NS_ATOM),
        ("xmlns:dc", NS_DC),
    ]);
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    let channel = &feed.channel;
    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "language", &channel.language)?;
    write_text_element(&mut writer, "lastBuildDate", &format_timestamp(&feed.last_build))?;
    write_text_element(&mut writer, "generator", &channel.generator)?;
    let self_link = BytesStart::new("atom:link").with_attributes([
        ("href", channel.self_link.as_str()),
        ("rel", "self"),
        ("type", "application/rss+xml"),
    ]);
    writer.write_event(Event::Empty(self_link))?;

    for item in &feed.items {
        write_item(&mut writer, item)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    info!(bytes = bytes.len(), "Serialized output feed");
    Ok(bytes)
}

fn write_item<W: Write>(writer: &mut Writer<W>, item: &OutputItem) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(writer, "title", &item.title)?;
    write_text_element(writer, "link", &item.link)?;
    write_text_element(writer, "description", &item.description)?;

    let permalink = if item.guid_is_permalink { "true" } else { "false" };
    writer.write_event(Event::Start(
        BytesStart::new("guid").with_attributes([("isPermaLink", permalink)]),
    ))?;
    writer.write_event(Event::Text(BytesText::new(&item.guid)))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;

    write_text_element(writer, "pubDate", &format_timestamp(&item.published_at))?;
    if let Some(creator) = &item.creator {
        write_text_element(writer, "dc:creator", creator)?;
    }
    for category in &item.categories {
        write_text_element(writer, "category", category)?;
    }

    if !item.content_html.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("content:encoded")))?;
        write_cdata(writer, &item.content_html)?;
        writer.write_event(Event::End(BytesEnd::new("content:encoded")))?;
    }

    for media in &item.media {
        let descriptor = BytesStart::new("media:content")
            .with_attributes([("url", media.url.as_str()), ("medium", media.medium.as_str())]);
        if media.caption.is_empty() {
            writer.write_event(Event::Empty(descriptor))?;
        } else {
            writer.write_event(Event::Start(descriptor))?;
            writer.write_event(Event::Start(
                BytesStart::new("media:description").with_attributes([("type", "plain")]),
            ))?;
            writer.write_event(Event::Text(BytesText::new(&media.caption)))?;
            writer.write_event(Event::End(BytesEnd::new("media:description")))?;
            writer.write_event(Event::End(BytesEnd::new("media:content")))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write `text` as CDATA, splitting around any `]]>` it contains.
fn write_cdata<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<()> {
    let parts: Vec<&str> = text.split("]]>").collect();
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        let mut chunk = String::with_capacity(part.len() + 3);
        if i > 0 {
            chunk.push('>');
        }
        chunk.push_str(part);
        if i < last {
            chunk.push_str("]]");
        }
        writer.write_event(Event::CData(BytesCData::new(chunk)))?;
    }
    Ok(())
}
