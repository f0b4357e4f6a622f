//! In-page script builders for element operations.
//!
//! Every builder returns a self-contained expression; arguments are embedded
//! as JSON literals so selectors and texts never need manual escaping.

/// JSON string literal for `value`.
pub fn literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

const IS_SHOWN: &str = r#"const isShown = (el) => {
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
};"#;

pub fn count(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", literal(selector))
}

pub fn count_with_text(selector: &str, text: &str) -> String {
    format!(
        r#"Array.from(document.querySelectorAll({sel}))
            .filter((el) => (el.textContent || '').replace(/\s+/g, ' ').includes({text}))
            .length"#,
        sel = literal(selector),
        text = literal(text.trim()),
    )
}

pub fn is_visible(selector: &str) -> String {
    format!(
        r#"(() => {{
            {IS_SHOWN}
            const el = document.querySelector({sel});
            return el ? isShown(el) : false;
        }})()"#,
        sel = literal(selector),
    )
}

/// "missing", "hidden" or "visible".
pub fn element_state(selector: &str) -> String {
    format!(
        r#"(() => {{
            {IS_SHOWN}
            const el = document.querySelector({sel});
            if (!el) return 'missing';
            return isShown(el) ? 'visible' : 'hidden';
        }})()"#,
        sel = literal(selector),
    )
}

pub fn click(selector: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#,
        sel = literal(selector),
    )
}

pub fn focus(selector: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.focus();
            return true;
        }})()"#,
        sel = literal(selector),
    )
}

/// Sets the value through the native setter so framework bindings see an
/// `input` event.
pub fn fill(selector: &str, text: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.focus();
            const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
            if (desc && desc.set) {{ desc.set.call(el, {text}); }} else {{ el.value = {text}; }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = literal(selector),
        text = literal(text),
    )
}

/// `null` when the element is missing.
pub fn is_checked(selector: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            return el ? !!el.checked : null;
        }})()"#,
        sel = literal(selector),
    )
}

pub fn check(selector: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return null;
            if (!el.checked) el.click();
            return !!el.checked;
        }})()"#,
        sel = literal(selector),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(literal(r#"li[title="广东省"]"#), r#""li[title=\"广东省\"]""#);
    }

    #[test]
    fn scripts_embed_selector_once_quoted() {
        let script = click("div.a > span");
        assert!(script.contains(r#"document.querySelector("div.a > span")"#));
        let script = count_with_text("li", " 存续 ");
        assert!(script.contains(r#""存续""#));
    }
}
