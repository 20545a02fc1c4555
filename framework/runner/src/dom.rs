//! Script builders for observing the page.
//!
//! Every observation goes through `evaluate` with a self-contained script, so
//! the same probes work against anything that can run JavaScript. Scripts
//! always return JSON-serialisable values and never throw for a missing
//! element.

/// What to look for on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A CSS selector, first match wins.
    Css(String),
    /// The deepest element whose text content contains (or equals) the needle.
    Text { needle: String, exact: bool },
    /// An anchor whose accessible name matches.
    Link { name: String },
}

impl Target {
    pub fn css(selector: &str) -> Self {
        Target::Css(selector.to_string())
    }

    pub fn text(needle: &str) -> Self {
        Target::Text {
            needle: needle.to_string(),
            exact: false,
        }
    }

    pub fn exact_text(needle: &str) -> Self {
        Target::Text {
            needle: needle.to_string(),
            exact: true,
        }
    }

    pub fn link(name: &str) -> Self {
        Target::Link {
            name: name.to_string(),
        }
    }

    /// Short human description used in assertion messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Target::Css(selector) => format!("'{selector}'"),
            Target::Text { needle, exact: false } => format!("text '{needle}'"),
            Target::Text { needle, exact: true } => format!("exact text '{needle}'"),
            Target::Link { name } => format!("link '{name}'"),
        }
    }

    /// A JavaScript expression evaluating to the matched element or null.
    fn finder(&self) -> String {
        match self {
            Target::Css(selector) => {
                format!("document.querySelector({})", js_string(selector))
            }
            Target::Text { needle, exact } => {
                let matcher = if *exact {
                    "el.textContent.trim() === needle"
                } else {
                    "el.textContent.includes(needle)"
                };
                // Walk all elements and keep the deepest match, so a needle
                // resolves to the element that actually renders the text
                // rather than <body>.
                format!(
                    "(() => {{ const needle = {}; let found = null; \
                     for (const el of document.querySelectorAll('*')) {{ \
                     if ({matcher}) found = el; }} return found; }})()",
                    js_string(needle)
                )
            }
            Target::Link { name } => format!(
                "(() => {{ const name = {}; \
                 for (const el of document.querySelectorAll('a')) {{ \
                 const label = (el.getAttribute('aria-label') || el.textContent).trim(); \
                 if (label === name) return el; }} return null; }})()",
                js_string(name)
            ),
        }
    }
}

/// Embed a Rust string as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Observe presence, visibility, class attribute and enabled state.
pub(crate) fn probe_element(target: &Target) -> String {
    format!(
        "(() => {{ const el = {}; \
         if (!el) return {{ found: false, visible: false, class: '', enabled: false }}; \
         const style = window.getComputedStyle(el); \
         const rect = el.getBoundingClientRect(); \
         const visible = style.display !== 'none' && style.visibility !== 'hidden' \
             && rect.width > 0 && rect.height > 0; \
         const enabled = !el.hasAttribute('disabled') && style.pointerEvents !== 'none'; \
         return {{ found: true, visible, class: el.getAttribute('class') || '', enabled }}; }})()",
        target.finder()
    )
}

pub(crate) fn count_matches(selector: &str) -> String {
    format!(
        "document.querySelectorAll({}).length",
        js_string(selector)
    )
}

/// Observe one resolved style property, or null when the target is missing.
pub(crate) fn computed_style(target: &Target, property: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return null; \
         return window.getComputedStyle(el).getPropertyValue({}); }})()",
        target.finder(),
        js_string(property)
    )
}

/// Observe whether an image target has finished loading with real content.
pub(crate) fn image_loaded(target: &Target) -> String {
    format!(
        "(() => {{ const el = {}; \
         if (!el) return {{ found: false, loaded: false }}; \
         return {{ found: true, loaded: el.complete === true && el.naturalHeight > 0 }}; }})()",
        target.finder()
    )
}

/// Scroll the target into view, reporting whether it was found.
pub(crate) fn scroll_into_view(target: &Target) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; \
         el.scrollIntoView({{ block: 'center' }}); return true; }})()",
        target.finder()
    )
}

/// Tag the target with a data attribute so it can be addressed by a plain
/// CSS selector afterwards. Used for hover, where the driver interaction
/// API only takes selectors.
pub(crate) const MARKED_SELECTOR: &str = "[data-crosswind-target]";

pub(crate) fn mark_target(target: &Target) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; \
         document.querySelectorAll('[data-crosswind-target]')\
             .forEach(n => n.removeAttribute('data-crosswind-target')); \
         el.setAttribute('data-crosswind-target', ''); return true; }})()",
        target.finder()
    )
}

/// Collect one attribute from every match of a selector, empty string when
/// the attribute is absent.
pub(crate) fn collect_attributes(selector: &str, attribute: &str) -> String {
    format!(
        "[...document.querySelectorAll({})].map(el => el.getAttribute({}) || '')",
        js_string(selector),
        js_string(attribute)
    )
}

/// Collect the trimmed text content of every match of a selector.
pub(crate) fn collect_texts(selector: &str) -> String {
    format!(
        "[...document.querySelectorAll({})].map(el => el.textContent.trim())",
        js_string(selector)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_finder_uses_query_selector() {
        let script = probe_element(&Target::css(".hero h1"));
        assert!(script.contains(r#"document.querySelector(".hero h1")"#));
    }

    #[test]
    fn text_finder_embeds_escaped_needle() {
        let script = probe_element(&Target::text(r#"it's a "quote""#));
        assert!(script.contains(r#""it's a \"quote\"""#));
        assert!(script.contains("includes(needle)"));
    }

    #[test]
    fn exact_text_compares_trimmed_content() {
        let script = probe_element(&Target::exact_text("Planes"));
        assert!(script.contains("el.textContent.trim() === needle"));
    }

    #[test]
    fn link_finder_checks_aria_label_first() {
        let script = probe_element(&Target::link("Ver planes"));
        assert!(script.contains("aria-label"));
        assert!(script.contains(r#""Ver planes""#));
    }

    #[test]
    fn selector_scripts_escape_backslashes() {
        let script = count_matches(r"div\:odd");
        assert!(script.contains(r#""div\\:odd""#));
    }

    #[test]
    fn describe_is_stable_for_messages() {
        assert_eq!(Target::css("nav").describe(), "'nav'");
        assert_eq!(Target::text("hi").describe(), "text 'hi'");
        assert_eq!(Target::link("Home").describe(), "link 'Home'");
    }
}
