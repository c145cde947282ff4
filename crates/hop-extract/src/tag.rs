use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};
use std::ops::Range;

use crate::Extractor;

/// A tag representing a hop address found in a line of tool output.
#[derive(Clone, Debug, Serialize)]
pub struct Tag {
    /// The address text itself.
    #[serde(rename = "value")]
    ip: String,
    /// The range in the original text where the address was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<Range<usize>>,
}

impl Tag {
    /// Create a new tag for an address.
    ///
    /// The `ip` should be the literal text of the address as found in the input.
    #[inline]
    pub fn new<S: Into<String>>(ip: S) -> Tag {
        Tag {
            ip: ip.into(),
            range: None,
        }
    }

    /// Set the byte range [start, end) where this tag was found in the original text.
    #[inline]
    #[must_use]
    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.range = Some(range);
        self
    }

    /// Get the address text.
    #[inline]
    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Get the range of this tag in the original text, if available.
    #[inline]
    #[must_use]
    pub fn range(&self) -> Option<&Range<usize>> {
        self.range.as_ref()
    }
}

/// A line of tool output with the hop tags found in it.
#[derive(Clone, Debug)]
pub struct Tagged {
    text: Vec<u8>,
    tags: Vec<Tag>,
}

/// JSON shape of a `Tagged` line: `{"tags":[...],"data":{"text":"..."}}`.
#[derive(Serialize)]
struct TaggedJson<'a> {
    tags: &'a [Tag],
    data: TextData<'a>,
}

#[derive(Serialize)]
struct TextData<'a> {
    text: Cow<'a, str>,
}

impl Tagged {
    /// Create a new `Tagged` container for a slice of text.
    #[inline]
    #[must_use]
    pub fn new(text: &[u8]) -> Tagged {
        Tagged {
            text: text.to_vec(),
            // a hop line carries the address at most a handful of times
            tags: Vec::with_capacity(4),
        }
    }

    /// Scan `text` with `extractor` and tag every address found.
    pub fn scan(text: &[u8], extractor: &Extractor) -> Tagged {
        let mut tagged = Tagged::new(text);
        for range in extractor.find_iter(text) {
            let ip = String::from_utf8_lossy(&text[range.clone()]).into_owned();
            tagged = tagged.tag(Tag::new(ip).with_range(range));
        }
        tagged
    }

    /// Adds a tag to this text.
    ///
    /// The tag should contain a range that corresponds to its position in `self.text()`.
    #[inline]
    #[must_use]
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Get the tags in this text.
    #[inline]
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Get the original text.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Writes the `Tagged` object as a single JSON object (no trailing newline).
    #[inline]
    pub fn write_json<W: Write + ?Sized>(&self, wtr: &mut W) -> io::Result<()> {
        let json = TaggedJson {
            tags: &self.tags,
            data: TextData {
                text: String::from_utf8_lossy(&self.text),
            },
        };
        serde_json::to_writer(wtr, &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_tags_in_order() {
        let line = b" 1  gw (10.0.0.1)  0.4 ms 10.0.0.2";
        let tagged = Tagged::scan(line, Extractor::global());
        let ips: Vec<&str> = tagged.tags().iter().map(Tag::ip).collect();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(tagged.tags()[0].range(), Some(&(8..16)));
    }

    #[test]
    fn json_shape() {
        let tagged = Tagged::scan(b"1 8.8.8.8", Extractor::global());
        let mut out = Vec::new();
        tagged.write_json(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"tags":[{"value":"8.8.8.8","range":{"start":2,"end":9}}],"data":{"text":"1 8.8.8.8"}}"#
        );
    }

    #[test]
    fn json_text_is_lossy_for_invalid_utf8() {
        let tagged = Tagged::scan(b"\xff 10.0.0.1", Extractor::global());
        let mut out = Vec::new();
        tagged.write_json(&mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["data"]["text"], "\u{fffd} 10.0.0.1");
        assert_eq!(json["tags"][0]["value"], "10.0.0.1");
    }
}
