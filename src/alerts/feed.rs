//! Google Alert Atom feeds.
//!
//! Each `<entry>` carries a `<link href>` pointing at a Google redirect, a
//! `<title type="html">` and a `<content type="html">` snippet. Title and
//! content are HTML-escaped inside the XML, so they are unescaped and then
//! stripped of tags.

use super::links::clean_link;
use crate::models::AlertLink;
use crate::utils::truncate_chars;
use crate::validators::text::strip_html;
use itertools::Itertools;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Content,
}

#[derive(Debug, Default)]
struct Entry {
    link: Option<String>,
    title: String,
    content: String,
}

fn href_of(e: &BytesStart<'_>) -> Result<Option<String>, Box<dyn Error>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"href" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Links from a Google Alert Atom feed, in feed order, first occurrence wins.
pub fn parse_alert_feed(
    xml: &str,
    exclude: &[String],
    max_context_chars: usize,
) -> Result<Vec<AlertLink>, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<Entry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" => current = Some(Entry::default()),
                b"title" if current.is_some() => field = Some(Field::Title),
                b"content" if current.is_some() => field = Some(Field::Content),
                b"link" => {
                    if let Some(entry) = current.as_mut() {
                        entry.link = href_of(&e)?;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(entry) = current.as_mut() {
                        entry.link = href_of(&e)?;
                    }
                }
            }
            Event::Text(e) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = e.unescape()?;
                    match f {
                        Field::Title => entry.title.push_str(&text),
                        Field::Content => entry.content.push_str(&text),
                    }
                }
            }
            Event::CData(e) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    match f {
                        Field::Title => entry.title.push_str(&text),
                        Field::Content => entry.content.push_str(&text),
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"title" | b"content" => field = None,
                b"entry" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let url = clean_link(entry.link.as_deref()?, exclude)?;
            let context = strip_html(&format!("{} {}", entry.title, entry.content));
            Some(AlertLink {
                url,
                context: truncate_chars(&context, max_context_chars),
            })
        })
        .unique_by(|link| link.url.clone())
        .collect())
}
