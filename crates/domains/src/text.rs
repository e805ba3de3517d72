//! # Text normalization
//!
//! Titles and entry bodies are lowercased with Turkish casing rules, and
//! slugs are ASCII transliterations. Different titles can share a slug
//! ("zeki müren" / "zeki muren"), so callers must pass candidates through
//! [`slug_candidate`] until a free one turns up.

/// Slug used when nothing transliterable is left of a title.
pub const FALLBACK_SLUG: &str = "untitled";

/// Lowercases `input` the Turkish way: `I` becomes `ı` and `İ` becomes `i`.
///
/// `str::to_lowercase` maps `İ` to `i` followed by a combining dot, which
/// is never what a Turkish reader expects.
pub fn turkish_lowercase(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            'I' => out.push('ı'),
            'İ' => out.push('i'),
            other => out.extend(other.to_lowercase()),
        }
    }
    out
}

/// Lowercases, trims and collapses inner whitespace of a title.
pub fn normalize_title(input: &str) -> String {
    turkish_lowercase(input)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn transliterate(ch: char) -> Option<&'static str> {
    let ascii = match ch {
        'ç' => "c",
        'ğ' => "g",
        'ı' | 'î' | 'í' | 'ì' | 'ï' => "i",
        'ö' | 'ô' | 'ó' | 'ò' | 'õ' => "o",
        'ş' => "s",
        'ü' | 'û' | 'ú' | 'ù' => "u",
        'â' | 'á' | 'à' | 'ä' | 'ã' | 'å' => "a",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'ñ' => "n",
        'ß' => "ss",
        'æ' => "ae",
        'ø' => "o",
        _ => return None,
    };
    Some(ascii)
}

/// Builds the base slug for a title. May be empty when the title has no
/// letters or digits left after transliteration.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in turkish_lowercase(input).chars() {
        let piece = if ch.is_ascii_alphanumeric() {
            Some(ch.encode_utf8(&mut [0; 4]).to_string())
        } else {
            transliterate(ch).map(str::to_string)
        };

        match piece {
            Some(piece) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(&piece);
            }
            None if ch.is_whitespace() || ch == '-' || ch == '_' => pending_dash = true,
            None => {}
        }
    }
    slug
}

/// The `attempt`-th slug to try for `base`: the base itself first, then
/// `base-2`, `base-3`, ...
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    let base = if base.is_empty() { FALLBACK_SLUG } else { base };
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}
