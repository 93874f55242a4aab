//! Markdown to HTML conversion with a configurable extension list.

pub mod highlight;

use pulldown_cmark::{html, Event, Options, Parser};

pub use highlight::HighlightTransformer;

/// Markdown processor configured from extension names.
#[derive(Debug, Clone)]
pub struct MarkdownProcessor {
    options: Options,
    highlight: bool,
}

impl MarkdownProcessor {
    /// Processor with the default extension set.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_DEFINITION_LIST);
        Self {
            options,
            highlight: true,
        }
    }

    /// Build a processor from extension names.
    ///
    /// Returns the processor and the names it did not recognize. Names may
    /// carry a `markdown.extensions.` prefix.
    pub fn with_extensions<S: AsRef<str>>(names: &[S]) -> (Self, Vec<String>) {
        let mut options = Options::empty();
        let mut highlight = false;
        let mut unknown = Vec::new();

        for name in names {
            let raw = name.as_ref();
            let short = raw.strip_prefix("markdown.extensions.").unwrap_or(raw);
            match short {
                "tables" => options.insert(Options::ENABLE_TABLES),
                "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
                "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
                "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
                "smart_punctuation" | "smarty" => {
                    options.insert(Options::ENABLE_SMART_PUNCTUATION)
                }
                "attr_list" | "heading_attributes" => {
                    options.insert(Options::ENABLE_HEADING_ATTRIBUTES)
                }
                "def_list" => options.insert(Options::ENABLE_DEFINITION_LIST),
                "codehilite" => highlight = true,
                // CommonMark always parses these
                "fenced_code" | "md_in_html" => {}
                _ => unknown.push(raw.to_string()),
            }
        }

        (Self { options, highlight }, unknown)
    }

    pub fn highlights_code(&self) -> bool {
        self.highlight
    }

    /// Convert markdown to an HTML fragment.
    pub fn render(&self, markdown: &str) -> String {
        let events: Vec<Event> = Parser::new_ext(markdown, self.options).collect();
        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        if self.highlight {
            let events = HighlightTransformer::new().transform(events);
            html::push_html(&mut html_output, events.into_iter());
        } else {
            html::push_html(&mut html_output, events.into_iter());
        }
        html_output
    }
}

impl Default for MarkdownProcessor {
    fn default() -> Self {
        Self::new()
    }
}
