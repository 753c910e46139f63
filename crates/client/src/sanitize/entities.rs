//! HTML entity decoding and re-escaping for sanitized text.
//!
//! Only a fixed table of entities is decoded: the basic XML set, the
//! non-breaking space and the typographic entities common in published prose.
//! Anything else is left untouched.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{0,31});").expect("valid entity regex")
});

/// Code points decoded when written as numeric references.
const NUMERIC: &[u32] = &[34, 38, 39, 60, 62, 160, 8211, 8212, 8216, 8217, 8220, 8221, 8230];

/// Resolve the body of an entity (without `&` and `;`) to its text.
fn lookup(name: &str) -> Option<char> {
    let named = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "ndash" => Some('\u{2013}'),
        "mdash" => Some('\u{2014}'),
        "lsquo" => Some('\u{2018}'),
        "rsquo" => Some('\u{2019}'),
        "ldquo" => Some('\u{201C}'),
        "rdquo" => Some('\u{201D}'),
        "hellip" => Some('\u{2026}'),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    if !NUMERIC.contains(&code) {
        return None;
    }
    match code {
        160 => Some(' '),
        _ => char::from_u32(code),
    }
}

/// Decode known entities in a single left-to-right pass.
pub fn decode(text: &str) -> Cow<'_, str> {
    ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| match lookup(&caps[1]) {
        Some(c) => c.to_string(),
        None => caps[0].to_string(),
    })
}

/// Escape text so it can sit next to markup. Every `&`, `<` and `>` is
/// escaped.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text);
    out
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

/// Decode known entities and escape the result in one pass.
///
/// Entities outside the fixed table are markup the author wrote and stay
/// as they are. Everything else, including an `&` produced by decoding
/// `&amp;`, is escaped, so `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for caps in ENTITY_RE.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_escaped(&mut out, &text[cursor..whole.start()]);
        match lookup(name.as_str()) {
            Some(c) => push_escaped(&mut out, c.encode_utf8(&mut [0; 4])),
            None => out.push_str(whole.as_str()),
        }
        cursor = whole.end();
    }
    push_escaped(&mut out, &text[cursor..]);
    out
}
