//! Page-side scripts evaluated through `Runtime.evaluate`
//!
//! Every script returns a plain object so `returnByValue` always carries a
//! value, even when nothing was found.

use action_primitives::SelectorQuery;
use serde::Deserialize;
use serde_json::Value;

/// Attribute stamped on resolved elements; its value is the handle id
pub const HANDLE_ATTRIBUTE: &str = "data-uiflow-handle";

/// Reply shared by all scripts
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptReply {
    pub ok: bool,
    pub handle: Option<String>,
    pub error: Option<String>,
}

fn literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// CSS selector matching the element stamped with `handle`
pub fn handle_selector(handle: &str) -> String {
    format!("[{}={}]", HANDLE_ATTRIBUTE, literal(handle))
}

/// Find the first element matching `query` and stamp it with a handle id.
///
/// Reply: `ok` with `handle` when found, `ok` without `handle` when absent,
/// `error` when the expression itself is invalid.
pub fn locate(query: &SelectorQuery) -> String {
    let lookup = match query {
        SelectorQuery::Css(css) => format!("document.querySelector({})", literal(css)),
        SelectorQuery::XPath(xpath) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            literal(xpath)
        ),
    };
    format!(
        r#"(() => {{
  let el;
  try {{ el = {lookup}; }} catch (e) {{ return {{ ok: false, error: String(e) }}; }}
  if (!el || el.nodeType !== 1) return {{ ok: true }};
  const attr = {attr};
  if (!el.hasAttribute(attr)) {{
    window.__uiflowSeq = (window.__uiflowSeq || 0) + 1;
    el.setAttribute(attr, String(window.__uiflowSeq));
  }}
  return {{ ok: true, handle: el.getAttribute(attr) }};
}})()"#,
        lookup = lookup,
        attr = literal(HANDLE_ATTRIBUTE),
    )
}

fn with_handle(handle: &str, body: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({selector});
  if (!el) return {{ ok: false, error: "stale" }};
  {body}
  return {{ ok: true }};
}})()"#,
        selector = literal(&handle_selector(handle)),
        body = body,
    )
}

/// Draw a border around the element
pub fn mark(handle: &str, border_css: &str) -> String {
    with_handle(
        handle,
        &format!(
            "el.scrollIntoView({{ block: 'center' }}); el.style.border = {};",
            literal(border_css)
        ),
    )
}

/// Empty an input and fire the events frameworks listen for
pub fn clear(handle: &str) -> String {
    with_handle(
        handle,
        "el.focus(); el.value = ''; \
         el.dispatchEvent(new Event('input', { bubbles: true })); \
         el.dispatchEvent(new Event('change', { bubbles: true }));",
    )
}

/// Submit the owning form, or click the element when it has none
pub fn submit(handle: &str) -> String {
    with_handle(
        handle,
        "const form = el.form || el.closest('form'); \
         if (form) { form.requestSubmit ? form.requestSubmit() : form.submit(); } else { el.click(); }",
    )
}
