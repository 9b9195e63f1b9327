//! Core data types for action primitives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Selector describing how a single element is found on the page
///
/// Mirrors the locating strategies the business flows rely on:
/// - CSS selector
/// - XPath expression
/// - Class name (the usual fallback for toast/message containers)
/// - Element id
/// - Visible text content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector
    Css(String),

    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),

    /// Single class name
    #[serde(rename = "class")]
    ClassName(String),

    /// Element id attribute
    Id(String),

    /// Text content (exact or partial match)
    Text {
        content: String,
        #[serde(default)]
        exact: bool,
    },
}

/// Normalized query a driver can execute directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorQuery {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Selector::XPath(value.into())
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        Selector::ClassName(value.into())
    }

    /// Lower the selector to either CSS or XPath.
    pub fn to_query(&self) -> SelectorQuery {
        match self {
            Selector::Css(css) => SelectorQuery::Css(css.clone()),
            Selector::XPath(xpath) => SelectorQuery::XPath(xpath.clone()),
            // "a b" names an element carrying both classes
            Selector::ClassName(class) => SelectorQuery::Css(
                class
                    .split_whitespace()
                    .map(|part| format!(".{}", part))
                    .collect(),
            ),
            Selector::Id(id) => SelectorQuery::Css(format!("[id=\"{}\"]", id.replace('"', "\\\""))),
            Selector::Text { content, exact } => {
                let literal = xpath_literal(content);
                if *exact {
                    SelectorQuery::XPath(format!("//*[normalize-space(text())={}]", literal))
                } else {
                    SelectorQuery::XPath(format!("//*[contains(text(), {})]", literal))
                }
            }
        }
    }

    /// Whether the selector carries an empty expression
    pub fn is_empty(&self) -> bool {
        match self {
            Selector::Css(s) | Selector::XPath(s) | Selector::ClassName(s) | Selector::Id(s) => {
                s.trim().is_empty()
            }
            Selector::Text { content, .. } => content.trim().is_empty(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{}", s),
            Selector::XPath(s) => write!(f, "xpath:{}", s),
            Selector::ClassName(s) => write!(f, "class:{}", s),
            Selector::Id(s) => write!(f, "id:{}", s),
            Selector::Text { content, exact } => {
                if *exact {
                    write!(f, "text:exact:'{}'", content)
                } else {
                    write!(f, "text:partial:'{}'", content)
                }
            }
        }
    }
}

fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// UI action applied to a resolved element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Click the element
    Click,

    /// Send keystrokes for `text`
    Type { text: String },

    /// Clear the element's value
    Clear,

    /// Submit the form the element belongs to
    Submit,

    /// Press a named key (`Enter`, `ArrowDown`, ...) `repeat` times
    PressKey {
        key: String,
        #[serde(default = "default_repeat")]
        repeat: u32,
    },
}

fn default_repeat() -> u32 {
    1
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Click => ActionKind::Click,
            Action::Type { .. } => ActionKind::Type,
            Action::Clear => ActionKind::Clear,
            Action::Submit => ActionKind::Submit,
            Action::PressKey { .. } => ActionKind::PressKey,
        }
    }

    /// Check payload invariants before the action reaches a driver.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Action::PressKey { key, .. } if key.trim().is_empty() => {
                Err("press_key action requires a key name".to_string())
            }
            Action::PressKey { repeat: 0, .. } => {
                Err("press_key repeat must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Payload-free discriminant of [`Action`], used in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Type,
    Clear,
    Submit,
    PressKey,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Clear => "clear",
            ActionKind::Submit => "submit",
            ActionKind::PressKey => "press_key",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Report of one interaction executor call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionReport {
    /// Action that was dispatched
    pub action: ActionKind,

    /// When the interaction started (before marking)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the evidence capture finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// Whether the visual marker was applied
    pub marked: bool,

    /// Screenshot captured after the action settled
    pub evidence_path: PathBuf,
}
