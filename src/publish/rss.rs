//! RSS 2.0 rendering with iTunes podcast extensions.
//!
//! The feed is a pure function of the user and their episode set:
//! identical inputs always produce identical XML, regardless of the
//! order in which episodes were originally published.

use chrono::{DateTime, Utc};

use crate::config::FeedSettings;
use crate::domain::{Episode, User};

/// Render a user's feed from their full episode set.
///
/// Episodes must already be in feed order (newest date first, then
/// rank, then id); the repository query guarantees this.
pub fn render_feed(user: &User, episodes: &[Episode], settings: &FeedSettings) -> String {
    let title = format!("Briefcast for {}", user.display_name());
    let description = format!(
        "Your personalized daily podcast, {}. Calendar briefings, document summaries, \
         and deep dives, generated every morning.",
        user.display_name()
    );
    let feed_link = format!(
        "{}/feeds/{}.xml",
        settings.base_url.trim_end_matches('/'),
        user.feed_token
    );
    let last_build = episodes
        .first()
        .map(|e| e.published_at)
        .unwrap_or(user.created_at);

    let mut xml = String::with_capacity(2048 + episodes.len() * 1024);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(
        "<rss version=\"2.0\" \
         xmlns:itunes=\"http://www.itunes.com/dtds/podcast-1.0.dtd\" \
         xmlns:atom=\"http://www.w3.org/2005/Atom\">\n",
    );
    xml.push_str("  <channel>\n");
    push_tag(&mut xml, "    ", "title", &title);
    push_tag(&mut xml, "    ", "description", &description);
    push_tag(&mut xml, "    ", "link", settings.base_url.trim_end_matches('/'));
    push_tag(&mut xml, "    ", "language", "en-us");
    push_tag(&mut xml, "    ", "lastBuildDate", &rfc2822(last_build));
    xml.push_str(&format!(
        "    <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\"/>\n",
        xml_escape(&feed_link)
    ));
    push_tag(&mut xml, "    ", "itunes:author", &settings.author);
    push_tag(&mut xml, "    ", "itunes:summary", &description);
    xml.push_str("    <itunes:owner>\n");
    push_tag(&mut xml, "      ", "itunes:name", &settings.author);
    push_tag(&mut xml, "      ", "itunes:email", &settings.owner_email);
    xml.push_str("    </itunes:owner>\n");
    xml.push_str("    <itunes:explicit>false</itunes:explicit>\n");
    xml.push_str("    <itunes:category text=\"News\"/>\n");

    for episode in episodes {
        xml.push_str("    <item>\n");
        push_tag(&mut xml, "      ", "title", &episode.title);
        push_tag(&mut xml, "      ", "description", &episode.description);
        push_tag(&mut xml, "      ", "pubDate", &rfc2822(episode.published_at));
        xml.push_str(&format!(
            "      <guid isPermaLink=\"false\">{}</guid>\n",
            xml_escape(&episode.id)
        ));
        xml.push_str(&format!(
            "      <enclosure url=\"{}\" length=\"{}\" type=\"audio/mpeg\"/>\n",
            xml_escape(&episode.audio_url),
            episode.file_size_bytes
        ));
        push_tag(
            &mut xml,
            "      ",
            "itunes:duration",
            &format_duration(episode.duration_seconds),
        );
        push_tag(&mut xml, "      ", "itunes:summary", &episode.description);
        xml.push_str("    </item>\n");
    }

    xml.push_str("  </channel>\n");
    xml.push_str("</rss>\n");
    xml
}

fn push_tag(xml: &mut String, indent: &str, tag: &str, value: &str) {
    xml.push_str(&format!("{indent}<{tag}>{}</{tag}>\n", xml_escape(value)));
}

fn rfc2822(at: DateTime<Utc>) -> String {
    at.to_rfc2822()
}

/// `HH:MM:SS` over an hour, `MM:SS` under.
pub fn format_duration(seconds: u32) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
