//! Splitting message bodies into plain text and classified links.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

const ELLIPSIS: char = '\u{2026}';
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["avi", "mov", "mp4", "webm"];
const YOUTUBE_EMBED_PREFIX: &str = "https://www.youtube.com/embed/";

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:(?:https?|ftp|file)://|www\.|ftp\.)(?:\([-A-Z0-9+&@#/%=~_|$?!:,.]*\)|[-A-Z0-9+&@#/%=~_|$?!:,.])*(?:\([-A-Z0-9+&@#/%=~_|$?!:,.]*\)|[A-Z0-9+&@#/%=~_|$])",
        )
        .expect("link pattern is valid")
    })
}

fn youtube_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?]v=([0-9a-zA-Z_-]+)").expect("video id pattern is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Plain,
    Link,
    Image,
    Video,
    /// A link with an embeddable player, see [`Segment::embed_url`].
    Embed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
    pub embed_url: Option<String>,
}

/// Last path segment, `""` for a directory.
fn file_name(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("")
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Plain,
            text: text.into(),
            embed_url: None,
        }
    }

    /// Classify a matched link by extension or by known video host.
    pub fn link(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut segment = Self {
            kind: SegmentKind::Link,
            text,
            embed_url: None,
        };

        let Ok(url) = Url::parse(&segment.text) else {
            return segment;
        };
        if !url.scheme().starts_with("http") {
            return segment;
        }

        let extension = file_name(&url)
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            segment.kind = SegmentKind::Image;
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            segment.kind = SegmentKind::Video;
        } else if url.host_str().is_some_and(|host| host.contains("youtube.com")) {
            if let Some(id) = youtube_id_regex().captures(&segment.text).and_then(|c| c.get(1)) {
                segment.embed_url = Some(format!("{YOUTUBE_EMBED_PREFIX}{}", id.as_str()));
                segment.kind = SegmentKind::Embed;
            }
        }
        segment
    }

    pub fn is_link(&self) -> bool {
        self.kind != SegmentKind::Plain
    }

    /// Human-readable form of a long link, at most about `threshold` characters.
    ///
    /// Short text, bare hosts and single-file paths without a query are kept
    /// whole. A host prefix that alone reaches the threshold is followed only
    /// by an ellipsis. Anything else keeps the host prefix and the tail of
    /// the link, `threshold` characters in total.
    pub fn summary(&self, threshold: usize) -> String {
        let length = self.text.chars().count();
        if length < threshold {
            return self.text.clone();
        }
        let Ok(url) = Url::parse(&self.text) else {
            return self.text.clone();
        };
        let path = url.path();
        if path.is_empty() || path == "/" {
            return self.text.clone();
        }

        let host = url.host_str().unwrap_or("");
        let host_prefix = format!("{}://{host}/", url.scheme());
        let prefix_len = host_prefix.chars().count();
        if prefix_len >= threshold {
            return format!("{host_prefix}{ELLIPSIS}");
        }

        if path.strip_prefix('/') == Some(file_name(&url)) && url.query().is_none() {
            return self.text.clone();
        }

        let tail_len = threshold - prefix_len - 1;
        let tail: String = self.text.chars().skip(length - tail_len).collect();
        format!("{host_prefix}{ELLIPSIS}{tail}")
    }
}

/// Split `body` at every link. Plain runs are trimmed and dropped when empty.
pub fn segment(body: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for found in link_regex().find_iter(body) {
        push_plain(&mut segments, &body[last..found.start()]);
        segments.push(Segment::link(found.as_str()));
        last = found.end();
    }
    push_plain(&mut segments, &body[last..]);
    segments
}

fn push_plain(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(Segment::plain(text));
    }
}
