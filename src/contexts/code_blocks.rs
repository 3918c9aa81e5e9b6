use crate::data::{FileDescriptor, ReferenceSolution};
use regex::Regex;

/// Pulls fenced source out of model output.
///
/// The fence language is fixed per extractor; the compiled pattern is never
/// mutated, so repeated calls on the same input give the same output.
#[derive(Debug, Clone)]
pub struct CodeBlockExtractor {
    language: String,
    fence: Regex,
}

impl CodeBlockExtractor {
    pub fn new(language: &str) -> Self {
        // ```java, ```java title="x" and ```java\r\n open a block on the next line;
        // ```java class A {}``` is a one-line block; ```javascript is neither
        let pattern = format!(
            r"(?s)```{}\b(?:[^\n`]*\n|[ \t]*)(.*?)```",
            regex::escape(language)
        );
        let fence = Regex::new(&pattern).expect("valid fence regex");
        Self {
            language: language.to_string(),
            fence,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Extracts code from a stored reference solution. `None` yields an empty string.
    pub fn extract(&self, source: Option<&ReferenceSolution>) -> String {
        match source {
            None => String::new(),
            Some(ReferenceSolution::Markdown(markdown)) => self.extract_text(markdown),
            Some(ReferenceSolution::Files(files)) => flatten_files(files),
        }
    }

    /// Concatenates the trimmed bodies of every fenced block, in source order,
    /// separated by one blank line.
    pub fn extract_text(&self, markdown: &str) -> String {
        self.fence
            .captures_iter(markdown)
            .filter_map(|captures| captures.get(1))
            .map(|body| body.as_str().trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for CodeBlockExtractor {
    fn default() -> Self {
        Self::new("java")
    }
}

/// Joins the content of every descriptor in list order with one blank line.
/// No fence parsing happens on this path; empty contents are skipped.
pub fn flatten_files(files: &[FileDescriptor]) -> String {
    files
        .iter()
        .filter(|file| !file.content.is_empty())
        .map(|file| file.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
