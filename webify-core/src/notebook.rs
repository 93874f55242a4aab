//! Jupyter notebook (nbformat 4) export to an HTML fragment.
//!
//! Produces the body of the notebook container only: cells with their
//! rendered inputs and stored outputs. Notebooks are never executed.

use crate::error::Result;
use crate::markdown::highlight::{highlight_code, html_escape};
use crate::markdown::MarkdownProcessor;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Cell source text: a string or a list of lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MultilineText {
    Single(String),
    Lines(Vec<String>),
}

impl Default for MultilineText {
    fn default() -> Self {
        MultilineText::Single(String::new())
    }
}

impl MultilineText {
    fn joined(&self) -> String {
        match self {
            MultilineText::Single(text) => text.clone(),
            MultilineText::Lines(lines) => lines.concat(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<Cell>,
    #[serde(default)]
    metadata: NotebookMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct NotebookMetadata {
    #[serde(default)]
    language_info: Option<LanguageInfo>,
    #[serde(default)]
    kernelspec: Option<KernelSpec>,
}

#[derive(Debug, Deserialize)]
struct LanguageInfo {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KernelSpec {
    language: Option<String>,
}

type MimeBundle = BTreeMap<String, JsonValue>;

#[derive(Debug, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum Cell {
    Markdown {
        #[serde(default)]
        source: MultilineText,
        #[serde(default)]
        attachments: BTreeMap<String, MimeBundle>,
    },
    Code {
        #[serde(default)]
        source: MultilineText,
        #[serde(default)]
        execution_count: Option<u64>,
        #[serde(default)]
        outputs: Vec<Output>,
    },
    Raw {
        #[serde(default)]
        source: MultilineText,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
enum Output {
    Stream {
        #[serde(default)]
        name: String,
        #[serde(default)]
        text: MultilineText,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
    },
    ExecuteResult {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        execution_count: Option<u64>,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
    #[serde(other)]
    Unknown,
}

fn ansi_escape() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ANSI regex"))
}

fn bundle_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Array(lines) => lines
            .iter()
            .filter_map(JsonValue::as_str)
            .collect::<Vec<_>>()
            .concat(),
        other => other.to_string(),
    }
}

/// Converts notebooks into HTML fragments.
#[derive(Debug, Default, Clone)]
pub struct NotebookExporter;

impl NotebookExporter {
    pub fn new() -> Self {
        Self
    }

    /// Export raw notebook JSON into the notebook container fragment.
    pub fn export(&self, raw: &str, markdown: &MarkdownProcessor) -> Result<String> {
        let notebook: Notebook = serde_json::from_str(raw)?;
        let language = notebook
            .metadata
            .language_info
            .and_then(|info| info.name)
            .or_else(|| notebook.metadata.kernelspec.and_then(|kernel| kernel.language))
            .unwrap_or_else(|| "python".to_string());

        let mut html = String::new();
        for cell in &notebook.cells {
            match cell {
                Cell::Markdown {
                    source,
                    attachments,
                } => {
                    let text = inline_attachments(&source.joined(), attachments);
                    html.push_str(
                        "<div class=\"cell border-box-sizing text_cell rendered\">\
                         <div class=\"inner_cell\">\
                         <div class=\"text_cell_render border-box-sizing rendered_html\">\n",
                    );
                    html.push_str(&markdown.render(&text));
                    html.push_str("</div></div></div>\n");
                }
                Cell::Code {
                    source,
                    execution_count,
                    outputs,
                } => {
                    html.push_str("<div class=\"cell border-box-sizing code_cell rendered\">\n");
                    html.push_str(&format!(
                        "<div class=\"input\"><div class=\"prompt input_prompt\">In&nbsp;[{}]:</div>\
                         <div class=\"inner_cell\"><div class=\"input_area\">{}</div></div></div>\n",
                        prompt(*execution_count),
                        highlight_code(&source.joined(), &language)
                    ));
                    if !outputs.is_empty() {
                        html.push_str("<div class=\"output_wrapper\"><div class=\"output\">\n");
                        for output in outputs {
                            render_output(&mut html, output);
                        }
                        html.push_str("</div></div>\n");
                    }
                    html.push_str("</div>\n");
                }
                Cell::Raw { source } => {
                    html.push_str("<div class=\"cell border-box-sizing raw_cell\">");
                    html.push_str(&source.joined());
                    html.push_str("</div>\n");
                }
                Cell::Unknown => {}
            }
        }
        Ok(html)
    }
}

fn prompt(count: Option<u64>) -> String {
    count.map(|n| n.to_string()).unwrap_or_else(|| "&nbsp;".to_string())
}

fn inline_attachments(source: &str, attachments: &BTreeMap<String, MimeBundle>) -> String {
    let mut text = source.to_string();
    for (name, bundle) in attachments {
        if let Some((mime, data)) = bundle.iter().next() {
            let uri = format!("data:{};base64,{}", mime, bundle_text(data).trim());
            text = text.replace(&format!("attachment:{}", name), &uri);
        }
    }
    text
}

fn render_output(html: &mut String, output: &Output) {
    match output {
        Output::Stream { name, text } => {
            let class = if name == "stderr" {
                "output_stderr"
            } else {
                "output_stdout"
            };
            html.push_str(&format!(
                "<div class=\"output_area\"><div class=\"output_subarea output_stream {} output_text\">\
                 <pre>{}</pre></div></div>\n",
                class,
                html_escape(&text.joined())
            ));
        }
        Output::DisplayData { data } => {
            html.push_str(&format!(
                "<div class=\"output_area\">{}</div>\n",
                render_bundle(data)
            ));
        }
        Output::ExecuteResult {
            data,
            execution_count,
        } => {
            html.push_str(&format!(
                "<div class=\"output_area\"><div class=\"prompt output_prompt\">Out[{}]:</div>{}</div>\n",
                prompt(*execution_count),
                render_bundle(data)
            ));
        }
        Output::Error {
            ename,
            evalue,
            traceback,
        } => {
            let body = if traceback.is_empty() {
                format!("{}: {}", ename, evalue)
            } else {
                traceback.join("\n")
            };
            let body = ansi_escape().replace_all(&body, "");
            html.push_str(&format!(
                "<div class=\"output_area\"><div class=\"output_subarea output_text output_error\">\
                 <pre>{}</pre></div></div>\n",
                html_escape(&body)
            ));
        }
        Output::Unknown => {}
    }
}

/// Richest representation first.
fn render_bundle(data: &MimeBundle) -> String {
    if let Some(value) = data.get("text/html") {
        return format!(
            "<div class=\"output_html rendered_html output_subarea\">{}</div>",
            bundle_text(value)
        );
    }
    if let Some(value) = data.get("image/svg+xml") {
        return format!(
            "<div class=\"output_svg output_subarea\">{}</div>",
            bundle_text(value)
        );
    }
    for mime in ["image/png", "image/jpeg", "image/gif"] {
        if let Some(value) = data.get(mime) {
            return format!(
                "<div class=\"output_{} output_subarea\"><img src=\"data:{};base64,{}\"></div>",
                mime.trim_start_matches("image/"),
                mime,
                bundle_text(value).trim()
            );
        }
    }
    if let Some(value) = data.get("text/markdown") {
        return format!(
            "<div class=\"output_markdown rendered_html output_subarea\">{}</div>",
            MarkdownProcessor::new().render(&bundle_text(value))
        );
    }
    match data.get("text/plain") {
        Some(value) => format!(
            "<div class=\"output_text output_subarea\"><pre>{}</pre></div>",
            html_escape(&bundle_text(value))
        ),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTEBOOK: &str = r##"{
      "nbformat": 4,
      "nbformat_minor": 5,
      "metadata": {"language_info": {"name": "python"}},
      "cells": [
        {"cell_type": "markdown", "metadata": {}, "source": ["# Intro\n", "![plot](attachment:p.png)"],
         "attachments": {"p.png": {"image/png": "iVBORw0KGgo="}}},
        {"cell_type": "code", "metadata": {}, "execution_count": 3, "source": "print('hi')",
         "outputs": [
           {"output_type": "stream", "name": "stdout", "text": ["hi\n"]},
           {"output_type": "execute_result", "execution_count": 3, "metadata": {},
            "data": {"text/plain": ["<42>"]}},
           {"output_type": "error", "ename": "ValueError", "evalue": "bad",
            "traceback": ["\u001b[0;31mValueError\u001b[0m: bad"]}
         ]},
        {"cell_type": "future_kind", "source": ""}
      ]
    }"##;

    #[test]
    fn test_export_cells() {
        let html = NotebookExporter::new()
            .export(NOTEBOOK, &MarkdownProcessor::new())
            .unwrap();
        assert!(html.contains("<h1>Intro</h1>"));
        assert!(html.contains("src=\"data:image/png;base64,iVBORw0KGgo=\""));
        assert!(html.contains("In&nbsp;[3]:"));
        assert!(html.contains("<pre>hi\n</pre>"));
        assert!(html.contains("&lt;42&gt;"));
        assert!(html.contains("ValueError: bad"));
        assert!(!html.contains("\u{1b}"));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = NotebookExporter::new()
            .export("{not json", &MarkdownProcessor::new())
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid notebook"));
    }

    fn code_notebook(metadata: &str) -> String {
        format!(
            r#"{{"metadata": {}, "cells": [{{"cell_type": "code", "execution_count": 1,
                "metadata": {{}}, "source": "{}", "outputs": []}}]}}"#,
            metadata, RUST_SOURCE
        )
    }

    const RUST_SOURCE: &str = "fn main() {}";

    #[test]
    fn test_language_from_kernelspec() {
        let raw = code_notebook(r#"{"kernelspec": {"language": "rust"}}"#);
        let html = NotebookExporter::new()
            .export(&raw, &MarkdownProcessor::new())
            .unwrap();
        let rust = highlight_code(RUST_SOURCE, "rust");
        assert_ne!(rust, highlight_code(RUST_SOURCE, "python"));
        assert!(html.contains(&rust));
    }

    #[test]
    fn test_language_info_preferred_over_kernelspec() {
        let raw = code_notebook(
            r#"{"language_info": {"name": "python"}, "kernelspec": {"language": "rust"}}"#,
        );
        let html = NotebookExporter::new()
            .export(&raw, &MarkdownProcessor::new())
            .unwrap();
        assert!(html.contains(&highlight_code(RUST_SOURCE, "python")));
        assert!(!html.contains(&highlight_code(RUST_SOURCE, "rust")));
    }
}
