//! `%(name)s` substitution for properties and XML templates.
//!
//! Templates carry literal `%` signs (XML entities, regexes, rates), so
//! rendering is two passes: [`escape_literal_percents`] turns every `%` that
//! does not open a placeholder into `%%`, then [`render`] substitutes
//! placeholders and collapses `%%` back to `%`.

use std::collections::BTreeMap;

pub type Context = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template references unknown key: {0}")]
    MissingKey(String),
    #[error("malformed placeholder at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
}

/// Escapes every `%` that is not `%(` or an existing `%%` pair.
#[must_use]
pub fn escape_literal_percents(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('(') => out.push('%'),
            Some('%') => {
                chars.next();
                out.push_str("%%");
            }
            // lone `%`, including a trailing one
            _ => out.push_str("%%"),
        }
    }
    out
}

/// Substitutes `%(name)s` placeholders in already-escaped text.
///
/// # Errors
/// Returns an error if a placeholder names a key missing from `context`, or
/// if a `%` is neither `%%` nor a well-formed `%(name)s`.
pub fn render(text: &str, context: &Context) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut offset = 0;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let at = offset + pos;
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('%') {
            out.push('%');
            offset = at + 2;
            rest = after;
            continue;
        }

        let Some(placeholder) = tail.strip_prefix('(') else {
            return Err(TemplateError::Malformed {
                offset: at,
                reason: "unescaped %",
            });
        };
        let close = placeholder.find(')').ok_or(TemplateError::Malformed {
            offset: at,
            reason: "unterminated placeholder",
        })?;
        let name = &placeholder[..close];
        let Some(after) = placeholder[close + 1..].strip_prefix('s') else {
            return Err(TemplateError::Malformed {
                offset: at,
                reason: "placeholder must end with )s",
            });
        };
        let value = context
            .get(name)
            .ok_or_else(|| TemplateError::MissingKey(name.to_string()))?;
        out.push_str(value);

        // `%(` + name + `)s`
        offset = at + 2 + close + 2;
        rest = after;
    }
    out.push_str(rest);
    Ok(out)
}

/// Escapes literal percent signs, then renders.
///
/// # Errors
/// See [`render`].
pub fn safe_render(text: &str, context: &Context) -> Result<String, TemplateError> {
    render(&escape_literal_percents(text), context)
}
