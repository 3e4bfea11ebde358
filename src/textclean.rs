//! Text cleaning for generated strings: forbidden-dash replacement and
//! whitespace canonicalization. Used unconditionally on every free-text
//! field that comes back from the text-generation service.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Characters the generator is never allowed to emit in final copy.
const FORBIDDEN_DASHES: [char; 2] = ['\u{2014}', '\u{2013}']; // em dash, en dash

/// Replace em/en dashes with `", "` and collapse whitespace.
/// Idempotent: `clean(clean(s)) == clean(s)`.
pub fn clean(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if FORBIDDEN_DASHES.contains(&ch) {
            out.push_str(", ");
        } else {
            out.push(ch);
        }
    }

    // Collapse runs of whitespace and fix ` ,` artifacts from the
    // replacement so repeated cleaning is stable.
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    let collapsed = re_ws.replace_all(&out, " ");

    static RE_SPACE_COMMA: OnceCell<Regex> = OnceCell::new();
    let re_sc = RE_SPACE_COMMA.get_or_init(|| Regex::new(r" ,").unwrap());
    re_sc.replace_all(&collapsed, ",").trim().to_string()
}

/// True if `s` still contains a dash the validators must reject.
pub fn has_forbidden_dash(s: &str) -> bool {
    s.chars().any(|c| FORBIDDEN_DASHES.contains(&c))
}
