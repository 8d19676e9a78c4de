//! Virtual files over a monolithic document.
//!
//! [`split`] derives the editor tabs, [`merge`] writes one tab back.
//! The root file always carries the whole document; region files carry
//! the trimmed body of their region and only exist when it is non-empty.

use serde::{Deserialize, Serialize};

use crate::document::{Language, ParsedDocument, RegionKind};

/// Name of the virtual file holding the entire document.
pub const ROOT_FILE: &str = "index.html";

/// A named, derived view over the monolithic document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub name: String,
    pub language: Language,
    pub content: String,
}

impl VirtualFile {
    fn root(doc: &str) -> Self {
        Self {
            name: ROOT_FILE.to_string(),
            language: Language::Html,
            content: doc.to_string(),
        }
    }

    fn region(kind: RegionKind, content: &str) -> Self {
        Self {
            name: kind.file_name().to_string(),
            language: kind.language(),
            content: content.to_string(),
        }
    }
}

/// What a virtual file name addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTarget {
    Root,
    Region(RegionKind),
    Unknown,
}

impl FileTarget {
    pub fn resolve(file_name: &str) -> Self {
        if file_name == ROOT_FILE {
            return FileTarget::Root;
        }
        RegionKind::from_file_name(file_name)
            .map(FileTarget::Region)
            .unwrap_or(FileTarget::Unknown)
    }
}

/// Decompose a document into virtual files, root first, then style, then script.
pub fn split(doc: &str) -> Vec<VirtualFile> {
    let parsed = ParsedDocument::parse(doc);
    let mut files = Vec::with_capacity(1 + RegionKind::ALL.len());
    files.push(VirtualFile::root(doc));
    for kind in RegionKind::ALL {
        if let Some(content) = parsed.content(kind) {
            files.push(VirtualFile::region(kind, content));
        }
    }
    files
}

/// Write `new_content` for `file_name` back into `doc`.
///
/// The root file replaces the whole document. A region file replaces that
/// region's content. An unknown name, or a region missing from `doc`,
/// leaves the document unchanged.
pub fn merge(doc: &str, file_name: &str, new_content: &str) -> String {
    match FileTarget::resolve(file_name) {
        FileTarget::Root => new_content.to_string(),
        FileTarget::Region(kind) => match ParsedDocument::parse(doc).splice(kind, new_content) {
            Some(merged) => merged,
            None => {
                log::debug!("No {kind:?} region in document; ignoring edit to {file_name}");
                doc.to_string()
            }
        },
        FileTarget::Unknown => {
            log::debug!("Ignoring edit to unknown virtual file {file_name}");
            doc.to_string()
        }
    }
}

/// Look up a file by name in a derived list.
pub fn find<'a>(files: &'a [VirtualFile], name: &str) -> Option<&'a VirtualFile> {
    files.iter().find(|file| file.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "<html><head><style>a{}</style></head><body><script type=\"text/babel\">x=1</script></body></html>";

    const GENERATED: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <script src="https://cdn.tailwindcss.com"></script>
    <style>
      body { font-family: Inter, sans-serif; }
    </style>
</head>
<body>
    <div id="root"></div>
    <script type="text/babel">
      const App = () => <h1>Hello</h1>;
      ReactDOM.createRoot(document.getElementById('root')).render(<App />);
    </script>
</body>
</html>"#;

    #[test]
    fn test_split_empty_document() {
        let files = split("");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, ROOT_FILE);
        assert_eq!(files[0].language, Language::Html);
        assert!(files[0].content.is_empty());
    }

    #[test]
    fn test_split_sample_into_three_files() {
        let files = split(SAMPLE);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["index.html", "styles.css", "App.tsx"]);
        assert_eq!(files[0].content, SAMPLE);
        assert_eq!(files[1].content, "a{}");
        assert_eq!(files[1].language, Language::Css);
        assert_eq!(files[2].content, "x=1");
        assert_eq!(files[2].language, Language::Javascript);
    }

    #[test]
    fn test_split_without_regions_has_only_root() {
        let doc = "<html><body><p>plain</p></body></html>";
        let files = split(doc);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, doc);
    }

    #[test]
    fn test_split_skips_blank_regions() {
        let doc = "<style>   </style><script type=\"text/babel\">run()</script>";
        let names: Vec<String> = split(doc).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["index.html", "App.tsx"]);
    }

    #[test]
    fn test_split_is_idempotent() {
        let first = split(GENERATED);
        let again = split(&first[0].content);
        assert_eq!(first, again);
    }

    #[test]
    fn test_merge_style_example() {
        let merged = merge(SAMPLE, "styles.css", "b{}");
        assert_eq!(merged, SAMPLE.replace("a{}", "b{}"));
        assert_eq!(find(&split(&merged), "App.tsx").unwrap().content, "x=1");
    }

    #[test]
    fn test_merge_script() {
        let merged = merge(SAMPLE, "App.tsx", "x=2");
        assert_eq!(merged, SAMPLE.replace("x=1", "x=2"));
    }

    #[test]
    fn test_merge_root_replaces_everything() {
        assert_eq!(merge(SAMPLE, ROOT_FILE, "<p>new</p>"), "<p>new</p>");
    }

    #[test]
    fn test_merge_unknown_file_is_noop() {
        assert_eq!(merge(SAMPLE, "nonexistent.ext", "x"), SAMPLE);
    }

    #[test]
    fn test_merge_into_missing_region_is_noop() {
        let doc = "<html><body></body></html>";
        assert_eq!(merge(doc, "styles.css", "a{}"), doc);
    }

    #[test]
    fn test_merge_split_fixed_point() {
        for doc in [SAMPLE, GENERATED] {
            for file in split(doc).iter().skip(1) {
                assert_eq!(merge(doc, &file.name, &file.content), doc, "file {}", file.name);
            }
        }
    }

    #[test]
    fn test_merge_preserves_indentation() {
        let merged = merge(GENERATED, "styles.css", "body { margin: 0; }");
        assert!(merged.contains("<style>\n      body { margin: 0; }\n    </style>"));
        assert!(merged.contains("const App = () => <h1>Hello</h1>;"));
    }

    #[test]
    fn test_last_merge_wins() {
        let once = merge(SAMPLE, "App.tsx", "x=A");
        let twice = merge(&once, "App.tsx", "x=B");
        assert_eq!(twice, merge(SAMPLE, "App.tsx", "x=B"));
    }

    #[test]
    fn test_file_target_resolve() {
        assert_eq!(FileTarget::resolve("index.html"), FileTarget::Root);
        assert_eq!(FileTarget::resolve("styles.css"), FileTarget::Region(RegionKind::Style));
        assert_eq!(FileTarget::resolve("App.tsx"), FileTarget::Region(RegionKind::Script));
        assert_eq!(FileTarget::resolve("main.rs"), FileTarget::Unknown);
    }
}
