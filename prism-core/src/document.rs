//! Region parser for monolithic generated documents.
//!
//! A generated app is one markup file with at most two regions we care
//! about: the first `<style>` block and the first Babel script block.
//! Parsing produces byte ranges into the source so that edits are a
//! structural splice instead of a pattern replace.
//!
//! ```text
//! <html><head><style>  a{}  </style></head><body><script type="text/babel">x=1</script>
//!             ├─open─┤├body┤├─close─┤             ├───────────open──────────┤├b┤├─close──┤
//!                       ├┤ content (trimmed body)
//! ```
//!
//! ## Limitations
//!
//! The scanner is literal-blind. A `<style>` or `</script>` sequence inside
//! a string literal or an HTML comment is treated as a real delimiter.
//! Only the first occurrence of each region is addressable; later
//! occurrences are part of the shell.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Opening delimiter of the style region.
pub const STYLE_OPEN: &str = "<style>";
/// Closing delimiter of the style region.
pub const STYLE_CLOSE: &str = "</style>";
/// Opening delimiter of the script region.
pub const SCRIPT_OPEN: &str = "<script type=\"text/babel\">";
/// Closing delimiter of the script region.
pub const SCRIPT_CLOSE: &str = "</script>";

/// Editor language tag attached to a virtual file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Html,
    Css,
    Javascript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Javascript => "javascript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of embedded region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Style,
    Script,
}

impl RegionKind {
    /// Regions in the order their virtual files are listed.
    pub const ALL: [RegionKind; 2] = [RegionKind::Style, RegionKind::Script];

    /// Opening and closing delimiters.
    pub fn delimiters(&self) -> (&'static str, &'static str) {
        match self {
            RegionKind::Style => (STYLE_OPEN, STYLE_CLOSE),
            RegionKind::Script => (SCRIPT_OPEN, SCRIPT_CLOSE),
        }
    }

    /// Name of the virtual file exposing this region.
    pub fn file_name(&self) -> &'static str {
        match self {
            RegionKind::Style => "styles.css",
            RegionKind::Script => "App.tsx",
        }
    }

    pub fn language(&self) -> Language {
        match self {
            RegionKind::Style => Language::Css,
            RegionKind::Script => Language::Javascript,
        }
    }

    /// Resolve a virtual file name back to its region.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.file_name() == name)
    }
}

/// One located region. All ranges are byte offsets into the parsed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    /// Span from the start of the opening delimiter to the end of the closing one.
    pub outer: Range<usize>,
    /// Span between the delimiters.
    pub body: Range<usize>,
}

impl Region {
    /// Span of the body with surrounding whitespace excluded.
    ///
    /// A whitespace-only body yields an empty span at the end of the body.
    pub fn content_range(&self, source: &str) -> Range<usize> {
        let body = &source[self.body.clone()];
        let leading = body.len() - body.trim_start().len();
        let start = self.body.start + leading;
        start..start + body.trim().len()
    }

    /// Trimmed body text.
    pub fn content<'a>(&self, source: &'a str) -> &'a str {
        &source[self.content_range(source)]
    }

    /// Whether the trimmed body is empty.
    pub fn is_blank(&self, source: &str) -> bool {
        self.content_range(source).is_empty()
    }
}

/// A monolithic document split into shell and optional typed regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument<'a> {
    source: &'a str,
    style: Option<Region>,
    script: Option<Region>,
}

impl<'a> ParsedDocument<'a> {
    /// Locate the first style and first script region. Never fails:
    /// a missing or unterminated region is simply absent.
    pub fn parse(source: &'a str) -> Self {
        Self {
            source,
            style: find_region(source, RegionKind::Style),
            script: find_region(source, RegionKind::Script),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn region(&self, kind: RegionKind) -> Option<&Region> {
        match kind {
            RegionKind::Style => self.style.as_ref(),
            RegionKind::Script => self.script.as_ref(),
        }
    }

    /// Trimmed content of a region, `None` when absent or blank.
    pub fn content(&self, kind: RegionKind) -> Option<&'a str> {
        self.region(kind)
            .filter(|region| !region.is_blank(self.source))
            .map(|region| region.content(self.source))
    }

    /// Replace the trimmed content of a region, keeping delimiters and the
    /// whitespace around the content. Returns `None` if the region is absent.
    pub fn splice(&self, kind: RegionKind, new_content: &str) -> Option<String> {
        let range = self.region(kind)?.content_range(self.source);
        let mut out =
            String::with_capacity(self.source.len() - range.len() + new_content.len());
        out.push_str(&self.source[..range.start]);
        out.push_str(new_content);
        out.push_str(&self.source[range.end..]);
        Some(out)
    }
}

/// Non-greedy scan: first opening delimiter, then the first closing
/// delimiter after it.
fn find_region(source: &str, kind: RegionKind) -> Option<Region> {
    let (open, close) = kind.delimiters();
    let start = source.find(open)?;
    let body_start = start + open.len();
    let body_end = body_start + source[body_start..].find(close)?;
    Some(Region {
        kind,
        outer: start..body_end + close.len(),
        body: body_start..body_end,
    })
}
