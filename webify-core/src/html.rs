//! Asset and link rewriting over rendered HTML fragments.
//!
//! Media tags get their local `src` copied into the asset area. Anchors
//! whose `href` carries a typed prefix (`index=`, `pdf=`, `md=`,
//! `notebook=`) are built as links and point at the result.

use crate::assets::AssetContext;
use crate::builder::{BuildContext, Session};
use crate::error::Result;
use crate::markdown::highlight::html_escape;
use crate::search::html_to_text;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

fn media_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(?:img|audio|embed|iframe|script|source|track|video)\b[^>]*>")
            .expect("valid media tag regex")
    })
}

fn src_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid src regex")
    })
}

fn anchor() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("valid anchor regex"))
}

fn href_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\shref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid href regex")
    })
}

fn typed_href() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(index|pdf|md|notebook)=(.+)$").expect("valid href regex"))
}

/// Value group of a quoted attribute match.
fn attr_value<'h>(caps: &Captures<'h>) -> Option<regex::Match<'h>> {
    caps.get(1).or_else(|| caps.get(2))
}

impl Session {
    /// Relocate media sources and resolve typed anchors in `html`.
    pub(crate) fn rewrite_html(
        &mut self,
        html: &str,
        assets: &AssetContext,
        register_links: bool,
    ) -> Result<String> {
        let html = self.rewrite_media(html, assets)?;
        self.rewrite_anchors(&html, assets, register_links)
    }

    fn rewrite_media(&mut self, html: &str, assets: &AssetContext) -> Result<String> {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for tag in media_tag().find_iter(html) {
            out.push_str(&html[last..tag.start()]);
            let text = tag.as_str();
            let src = src_attr().captures(text).and_then(|caps| attr_value(&caps));
            match src {
                Some(value) => match self.relocator.relocate(value.as_str(), assets)? {
                    Some(url) => {
                        out.push_str(&text[..value.start()]);
                        out.push_str(&url);
                        out.push_str(&text[value.end()..]);
                    }
                    None => out.push_str(text),
                },
                None => out.push_str(text),
            }
            last = tag.end();
        }
        out.push_str(&html[last..]);
        Ok(out)
    }

    fn rewrite_anchors(
        &mut self,
        html: &str,
        assets: &AssetContext,
        register_links: bool,
    ) -> Result<String> {
        let ctx = BuildContext {
            image_key: None,
            assets: assets.clone(),
            search_slug: None,
            search_links: register_links,
        };

        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for caps in anchor().captures_iter(html) {
            let (Some(whole), Some(attrs), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let href = href_attr().captures(attrs.as_str());
            let href_value = href.as_ref().and_then(attr_value);
            let typed = href_value.and_then(|value| typed_href().captures(value.as_str()));
            let Some(typed) = typed else {
                continue;
            };
            let (Some(href_value), Some(key), Some(target)) = (href_value, typed.get(1), typed.get(2))
            else {
                continue;
            };

            let mut link = Mapping::new();
            link.insert(Value::from(key.as_str()), Value::from(target.as_str()));
            let inner_text = html_to_text(inner.as_str());
            if !inner_text.is_empty() {
                link.insert(Value::from("text"), Value::from(inner_text.clone()));
            }
            let built = self.build_link(Value::Mapping(link), &ctx, register_links)?;
            let url = built.get("link").and_then(Value::as_str).unwrap_or_default();

            out.push_str(&html[last..whole.start()]);
            out.push_str("<a");
            out.push_str(&attrs.as_str()[..href_value.start()]);
            out.push_str(url);
            out.push_str(&attrs.as_str()[href_value.end()..]);
            if let Some(description) = built.get("description").and_then(Value::as_str) {
                out.push_str(&format!(
                    " data-bs-toggle=\"tooltip\" data-bs-html=\"true\" title=\"{}\"",
                    html_escape(description)
                ));
            }
            out.push('>');
            match built.get("text").and_then(Value::as_str) {
                Some(text) if inner_text.is_empty() => out.push_str(&html_escape(text)),
                _ => out.push_str(inner.as_str()),
            }
            out.push_str("</a>");
            last = whole.end();
        }
        out.push_str(&html[last..]);
        Ok(out)
    }
}
