/// Typographic look-alikes mapped to their plain ASCII counterparts.
/// Backticks are dropped entirely so fenced model output loses its fences.
const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{00A0}', " "),
    ('\u{2012}', "-"),
    ('`', ""),
];

/// Canonicalize punctuation variants and trim surrounding whitespace
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == ch) {
            Some((_, to)) => out.push_str(to),
            None => out.push(ch),
        }
    }
    out.trim().to_string()
}
