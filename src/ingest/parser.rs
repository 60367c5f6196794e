// src/ingest/parser.rs
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::{GatorError, Result};
use crate::ingest::types::{ParsedFeed, ParsedItem};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    // `<atom:link href=.../>` may decode here as well; only text links count.
    #[serde(default)]
    link: Vec<ChannelLink>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct ChannelLink {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    description: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: String,
}

/// Decode an RSS 2.0 document.
///
/// Text fields (channel title/description, item title/description) are run
/// through HTML entity decoding once after the XML decode; publishers
/// routinely double-encode them. Links and dates are left as-is.
pub fn parse_feed(raw: &[u8]) -> Result<ParsedFeed> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| GatorError::MalformedFeed(format!("feed is not valid UTF-8: {e}")))?;
    let text = text.trim_start_matches('\u{feff}');
    let xml_clean = scrub_html_entities_for_xml(text);

    let rss: Rss = from_str(&xml_clean).map_err(|e| GatorError::MalformedFeed(e.to_string()))?;
    let ch = rss.channel;

    Ok(ParsedFeed {
        title: unescape(&ch.title),
        description: unescape(&ch.description),
        link: ch
            .link
            .into_iter()
            .map(|l| l.value.trim().to_string())
            .find(|l| !l.is_empty())
            .unwrap_or_default(),
        items: ch
            .item
            .into_iter()
            .map(|it| ParsedItem {
                title: unescape(&it.title),
                link: it.link,
                description: it.description.as_deref().map(unescape),
                pub_date: it.pub_date,
            })
            .collect(),
    })
}

fn unescape(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// HTML named entities are not valid XML. Rewrite the common ones to numeric
/// character references so the XML decoder accepts them.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&ldquo;", "&#8220;")
        .replace("&rdquo;", "&#8221;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rsquo;", "&#8217;")
        .replace("&hellip;", "&#8230;")
}
