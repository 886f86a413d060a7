use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics by decomposing to NFD and dropping combining marks.
/// `"AÇÚCAR"` becomes `"ACUCAR"`.
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Canonical vocabulary form: trimmed, accent-free, upper-case.
pub fn fold_token(s: &str) -> String {
    strip_accents(s.trim()).to_uppercase()
}
