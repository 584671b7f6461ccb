//! Pattern-based reading of agent-authored app markup.
//!
//! Only the root element's `id`, `data-title` and inline `style` are inspected, plus the
//! `app-title-text` element and embedded `<script>` bodies. Nothing here parses HTML.
//!
//! The root is the first element after any leading comments, `<style>`, `<script>`, `<link>`
//! and `<meta>` nodes, so a definition may ship its stylesheet ahead of its body.

use std::sync::OnceLock;

use regex::Regex;
use sandbox_contract::{AppDefinition, AppId};

use crate::model::{CreateWindowRequest, GeometryHint};

/// Title used when neither the definition nor the markup names one.
pub const FALLBACK_TITLE: &str = "Application";

fn root_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(?is)\A(?:\s+|<!--.*?-->|<style\b[^>]*>.*?</style\s*>",
            r"|<script\b[^>]*>.*?</script\s*>|<link\b[^>]*>|<meta\b[^>]*>)*",
            r"<[A-Za-z][\w-]*([^>]*)>",
        ))
        .expect("root tag pattern is valid")
    })
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:^|\s)([\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("attribute pattern is valid")
    })
}

fn title_text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)class\s*=\s*["'][^"']*\bapp-title-text\b[^"']*["'][^>]*>([^<]+)<"#)
            .expect("title text pattern is valid")
    })
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("script pattern is valid")
    })
}

fn style_property_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:^|;)\s*(top|left|width|height)\s*:\s*(-?\d+(?:\.\d+)?)px")
            .expect("style property pattern is valid")
    })
}

/// Attributes of the root element as `(name, value)` pairs, in source order.
pub fn root_attributes(html: &str) -> Vec<(String, String)> {
    let Some(attrs) = root_tag_pattern()
        .captures(html)
        .and_then(|caps| caps.get(1))
    else {
        return Vec::new();
    };
    attribute_pattern()
        .captures_iter(attrs.as_str())
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
            Some((name, value))
        })
        .collect()
}

fn root_attribute(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

/// The root element's `id`, when it is a usable app id.
pub fn root_id(html: &str) -> Option<AppId> {
    let attrs = root_attributes(html);
    let raw = root_attribute(&attrs, "id")?;
    AppId::new(raw.trim()).ok()
}

/// Title declared by the markup itself.
pub fn declared_title(html: &str) -> Option<String> {
    let attrs = root_attributes(html);
    if let Some(title) = root_attribute(&attrs, "data-title") {
        let title = title.trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }
    title_text_pattern()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Pixel geometry from the root element's inline `style`.
pub fn declared_geometry(html: &str) -> GeometryHint {
    let attrs = root_attributes(html);
    let Some(style) = root_attribute(&attrs, "style") else {
        return GeometryHint::default();
    };
    let mut hint = GeometryHint::default();
    for caps in style_property_pattern().captures_iter(&style) {
        let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Ok(value) = value.as_str().parse::<f64>() else {
            continue;
        };
        let value = value.round() as i32;
        match name.as_str().to_ascii_lowercase().as_str() {
            "top" => hint.top = Some(value),
            "left" => hint.left = Some(value),
            "width" => hint.width = Some(value),
            "height" => hint.height = Some(value),
            _ => {}
        }
    }
    hint
}

/// Inline `<script>` bodies in document order. External `src` scripts are skipped.
pub fn init_scripts(html: &str) -> Vec<String> {
    script_pattern()
        .captures_iter(html)
        .filter(|caps| {
            caps.get(1)
                .map(|attrs| !attrs.as_str().to_ascii_lowercase().contains("src"))
                .unwrap_or(true)
        })
        .filter_map(|caps| caps.get(2))
        .map(|body| body.as_str().trim().to_string())
        .filter(|body| !body.is_empty())
        .collect()
}

/// Builds the window-manager request for an app definition.
pub fn request_from_definition(definition: &AppDefinition) -> CreateWindowRequest {
    let html = definition.html();
    let title = definition
        .title()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .or_else(|| declared_title(html))
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());
    CreateWindowRequest {
        id: root_id(html),
        title,
        content: html.to_string(),
        geometry: declared_geometry(html),
    }
}
