//! Splits one freeform agent reply into narrative text, an optional app and an optional script.
//!
//! Extraction is pattern-based and never fails. Each step takes the first match, removes it from
//! the working text and hands the rest to the next step:
//!
//! 1. the first fenced `javascript`/`js` block becomes the script;
//! 2. a fenced `json` block carrying a string `title` becomes the app title;
//! 3. the first fenced `html` block, an untagged fence holding a marker-class root, or else the
//!    first bare `<div>` fragment carrying the marker class becomes the app markup;
//! 4. what is left, trimmed, is the narrative.

use std::{ops::Range, sync::OnceLock};

use regex::Regex;
use sandbox_contract::AppDefinition;
use serde::{Deserialize, Serialize};

use crate::config::{HostConfig, DEFAULT_ACKNOWLEDGEMENT, DEFAULT_APP_MARKER_CLASS};

/// Result of splitting one agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractedResponse {
    pub narrative_text: String,
    pub title: Option<String>,
    pub app_html: Option<String>,
    pub script: Option<String>,
}

impl ExtractedResponse {
    /// The app definition to send as `ADD_APP`, titled when a metadata block named one.
    pub fn app_definition(&self) -> Option<AppDefinition> {
        let html = self.app_html.as_ref()?;
        Some(match &self.title {
            Some(title) => AppDefinition::titled(title.clone(), html.clone()),
            None => AppDefinition::markup(html.clone()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AppMetadata {
    title: String,
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)(?:```|''')([\w+-]*)[ \t]*(?:\r?\n)?(.*?)(?:```|''')")
            .expect("fence pattern is valid")
    })
}

struct Fence {
    range: Range<usize>,
    lang: String,
    body: String,
}

fn fences(text: &str) -> Vec<Fence> {
    fence_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Fence {
                range: whole.range(),
                lang: caps
                    .get(1)
                    .map(|m| m.as_str().to_ascii_lowercase())
                    .unwrap_or_default(),
                body: caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Reusable extractor bound to one marker class and acknowledgement text.
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    marker_root: Regex,
    bare_fragment: Regex,
    default_acknowledgement: String,
}

impl ResponseExtractor {
    /// Builds an extractor recognizing bare fragments whose root `div` carries `marker_class`.
    pub fn new(marker_class: &str, default_acknowledgement: impl Into<String>) -> Self {
        let marker = regex::escape(marker_class.trim());
        let class_attr = format!(
            r#"class\s*=\s*(?:"[^"]*\b{marker}\b[^"]*"|'[^']*\b{marker}\b[^']*')"#
        );
        Self {
            marker_root: Regex::new(&format!(r"(?s)<div\b[^>]*{class_attr}"))
                .expect("escaped marker yields a valid pattern"),
            bare_fragment: Regex::new(&format!(r"(?s)<div\b[^>]*{class_attr}.*</div>"))
                .expect("escaped marker yields a valid pattern"),
            default_acknowledgement: default_acknowledgement.into(),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(&config.app_marker_class, config.default_acknowledgement.clone())
    }

    /// Splits `text` into its parts.
    pub fn extract(&self, text: &str) -> ExtractedResponse {
        let mut remaining = text.to_string();

        let script = fences(&remaining)
            .into_iter()
            .find(|fence| matches!(fence.lang.as_str(), "javascript" | "js"))
            .map(|fence| {
                remaining.replace_range(fence.range, "");
                fence.body.trim().to_string()
            });

        let title = fences(&remaining)
            .into_iter()
            .find(|fence| fence.lang == "json")
            .and_then(|fence| match serde_json::from_str::<AppMetadata>(&fence.body) {
                Ok(meta) if !meta.title.trim().is_empty() => {
                    remaining.replace_range(fence.range, "");
                    Some(meta.title.trim().to_string())
                }
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!("metadata block ignored: {err}");
                    None
                }
            });

        let app_html = self.take_app_markup(&mut remaining);

        let mut narrative_text = remaining.trim().to_string();
        if narrative_text.is_empty() && (app_html.is_some() || script.is_some()) {
            narrative_text = self.default_acknowledgement.clone();
        }

        ExtractedResponse {
            narrative_text,
            title,
            app_html,
            script,
        }
    }

    fn take_app_markup(&self, remaining: &mut String) -> Option<String> {
        let fenced = fences(remaining).into_iter().find(|fence| {
            fence.lang == "html" || (fence.lang.is_empty() && self.marker_root.is_match(&fence.body))
        });
        if let Some(fence) = fenced {
            remaining.replace_range(fence.range, "");
            return Some(fence.body.trim().to_string());
        }

        let range = self.bare_fragment.find(remaining)?.range();
        let html = remaining[range.clone()].trim().to_string();
        remaining.replace_range(range, "");
        Some(html)
    }
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_APP_MARKER_CLASS, DEFAULT_ACKNOWLEDGEMENT)
    }
}

/// Splits `text` with the default marker class and acknowledgement.
pub fn extract_response(text: &str) -> ExtractedResponse {
    static EXTRACTOR: OnceLock<ResponseExtractor> = OnceLock::new();
    EXTRACTOR.get_or_init(ResponseExtractor::default).extract(text)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn script_block_is_removed_from_narrative() {
        let extracted = extract_response("```javascript\n// Target App: calc\nfoo();\n```\nDone.");
        assert_eq!(
            extracted,
            ExtractedResponse {
                narrative_text: "Done.".to_string(),
                title: None,
                app_html: None,
                script: Some("// Target App: calc\nfoo();".to_string()),
            }
        );
    }

    #[test]
    fn lone_app_block_gets_default_acknowledgement() {
        let extracted = extract_response(
            "```html\n<div id=\"calc\" class=\"ai-app-window\"><p>0</p></div>\n```",
        );
        assert_eq!(extracted.narrative_text, DEFAULT_ACKNOWLEDGEMENT);
        assert_eq!(
            extracted.app_html.as_deref(),
            Some("<div id=\"calc\" class=\"ai-app-window\"><p>0</p></div>")
        );
        assert_eq!(extracted.script, None);
    }

    #[test]
    fn bare_marker_fragment_is_extracted() {
        let text = "Here you go:\n<div id='notes' class='p-2 ai-app-window'><div>x</div></div>\nEnjoy.";
        let extracted = extract_response(text);
        assert_eq!(
            extracted.app_html.as_deref(),
            Some("<div id='notes' class='p-2 ai-app-window'><div>x</div></div>")
        );
        assert_eq!(extracted.narrative_text, "Here you go:\n\nEnjoy.");
    }

    #[test]
    fn div_without_marker_is_left_in_text() {
        let extracted = extract_response("Use <div class=\"box\">x</div> for layout.");
        assert_eq!(extracted.app_html, None);
        assert_eq!(extracted.narrative_text, "Use <div class=\"box\">x</div> for layout.");
    }

    #[test]
    fn metadata_title_is_attached_to_app() {
        let text = "```json\n{\"title\": \"Clock\"}\n```\n```html\n<div id=\"clock\">12:00</div>\n```\nBuilt a clock.";
        let extracted = extract_response(text);
        assert_eq!(extracted.title.as_deref(), Some("Clock"));
        assert_eq!(extracted.narrative_text, "Built a clock.");
        assert_eq!(
            extracted.app_definition(),
            Some(AppDefinition::titled("Clock", "<div id=\"clock\">12:00</div>"))
        );
    }

    #[test]
    fn broken_metadata_keeps_extracting() {
        let text = "```json\n{title: nope\n```\n```javascript\n// Target App: a\nx();\n```";
        let extracted = extract_response(text);
        assert_eq!(extracted.title, None);
        assert_eq!(extracted.script.as_deref(), Some("// Target App: a\nx();"));
        assert_eq!(extracted.narrative_text, "```json\n{title: nope\n```");
    }

    #[test]
    fn only_first_script_block_is_taken() {
        let text = "```js\none();\n```\nthen\n```javascript\ntwo();\n```";
        let extracted = extract_response(text);
        assert_eq!(extracted.script.as_deref(), Some("one();"));
        assert!(extracted.narrative_text.contains("two();"));
    }

    #[test]
    fn at_most_one_app_is_taken_per_reply() {
        let text = "```html\n<div id=\"a\">A</div>\n```\nand\n```html\n<div id=\"b\">B</div>\n```";
        let extracted = extract_response(text);
        assert_eq!(extracted.app_html.as_deref(), Some("<div id=\"a\">A</div>"));
        assert!(extracted.narrative_text.contains("<div id=\"b\">B</div>"));

        let mixed = "```html\n<div id=\"a\">A</div>\n```\n<div id=\"b\" class=\"ai-app-window\">B</div>";
        let extracted = extract_response(mixed);
        assert_eq!(extracted.app_html.as_deref(), Some("<div id=\"a\">A</div>"));
        assert_eq!(
            extracted.narrative_text,
            "<div id=\"b\" class=\"ai-app-window\">B</div>"
        );
    }

    #[test]
    fn plain_text_passes_through() {
        let extracted = extract_response("  Just chatting.  ");
        assert_eq!(
            extracted,
            ExtractedResponse {
                narrative_text: "Just chatting.".to_string(),
                ..ExtractedResponse::default()
            }
        );
        assert_eq!(extract_response("").narrative_text, "");
    }

    #[test]
    fn custom_marker_class_is_respected() {
        let extractor = ResponseExtractor::new("agent.app", "ok");
        let extracted = extractor.extract("<div class=\"agent.app\">a</div>");
        assert_eq!(extracted.app_html.as_deref(), Some("<div class=\"agent.app\">a</div>"));
        assert_eq!(extracted.narrative_text, "ok");
        assert_eq!(extractor.extract("<div class=\"agentxapp\">a</div>").app_html, None);
    }
}
