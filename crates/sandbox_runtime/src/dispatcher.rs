//! Target resolution for interaction scripts.
//!
//! A script names its app with a leading `// Target App: <app-id>` comment. Without one, the
//! body is scanned for element lookups whose literal argument is the id of an open app.

use std::sync::OnceLock;

use regex::Regex;
use sandbox_contract::AppId;
use thiserror::Error;

/// Exact first-line comment shape the agent is instructed to use.
pub const TARGET_DIRECTIVE_PREFIX: &str = "// Target App:";

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\A//\s*target\s+app\s*:\s*(\S+)\s*\z").expect("directive pattern is valid")
    })
}

fn lookup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?:getElementById\(\s*["'`]([^"'`]+)["'`]\s*\)|querySelector(?:All)?\(\s*["'`]#([A-Za-z][\w:.-]*))"#,
        )
        .expect("lookup pattern is valid")
    })
}

/// How a script's target was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Directive,
    ElementLookup,
    /// Deprecated permissive fallback to the frontmost window.
    MostRecentWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub app_id: AppId,
    pub source: TargetSource,
}

/// Reasons a script could not be routed. The display text is sent to the host verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("the script was empty")]
    EmptyScript,
    #[error("the target directive names `{0}`, which is not a valid app id")]
    InvalidDirective(String),
    #[error(
        "the script did not start with a `// Target App: <app-id>` comment and no element lookup in it names an open app"
    )]
    NoTarget,
}

/// Parses the leading target directive, if the first line is one.
pub fn directive_target(script: &str) -> Option<Result<AppId, ResolveError>> {
    let first_line = script.trim_start().lines().next()?.trim();
    let caps = directive_pattern().captures(first_line)?;
    let raw = caps.get(1)?.as_str();
    Some(AppId::new(raw).map_err(|_| ResolveError::InvalidDirective(raw.to_string())))
}

/// Ids passed as literals to `getElementById` / `querySelector('#…')`, in source order.
pub fn lookup_candidates(script: &str) -> Vec<String> {
    lookup_pattern()
        .captures_iter(script)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Resolves the app a script is meant for.
///
/// A directive is authoritative even when it names an app that is not open. The lookup
/// heuristic only accepts ids for which `is_open` returns `true`.
///
/// # Errors
///
/// Returns a [`ResolveError`] describing why no single app could be chosen.
pub fn resolve_target(
    script: &str,
    is_open: impl Fn(&AppId) -> bool,
) -> Result<ResolvedTarget, ResolveError> {
    if script.trim().is_empty() {
        return Err(ResolveError::EmptyScript);
    }
    if let Some(directive) = directive_target(script) {
        return directive.map(|app_id| ResolvedTarget {
            app_id,
            source: TargetSource::Directive,
        });
    }
    lookup_candidates(script)
        .into_iter()
        .filter_map(|raw| AppId::new(raw).ok())
        .find(|app_id| is_open(app_id))
        .map(|app_id| ResolvedTarget {
            app_id,
            source: TargetSource::ElementLookup,
        })
        .ok_or(ResolveError::NoTarget)
}
