//! Language codes shared by the transcriber and the translation backends.
//!
//! Whisper reports ISO-639-1 codes, and the local M2M100 model expects the
//! same two-letter ids (plus a few three-letter ones). Region or script
//! suffixes (`en-US`, `zh_Hans`) are stripped before any lookup.

use isolang::Language;

/// Code used when neither the user nor the transcriber named a source language.
pub const AUTO: &str = "auto";

/// Languages listed by `vidsub languages`, most common targets first.
pub const COMMON_LANGUAGES: &[&str] = &[
    "zh", "en", "ja", "ko", "fr", "de", "es", "ru", "pt", "it", "ar",
];

/// Language ids understood by the M2M100 family of models.
pub const M2M100_LANGUAGES: &[&str] = &[
    "af", "am", "ar", "ast", "az", "ba", "be", "bg", "bn", "br", "bs", "ca", "ceb", "cs", "cy",
    "da", "de", "el", "en", "es", "et", "fa", "ff", "fi", "fr", "fy", "ga", "gd", "gl", "gu",
    "ha", "he", "hi", "hr", "ht", "hu", "hy", "id", "ig", "ilo", "is", "it", "ja", "jv", "ka",
    "kk", "km", "kn", "ko", "lb", "lg", "ln", "lo", "lt", "lv", "mg", "mk", "ml", "mn", "mr",
    "ms", "my", "ne", "nl", "no", "ns", "oc", "or", "pa", "pl", "ps", "pt", "ro", "ru", "sd",
    "si", "sk", "sl", "so", "sq", "sr", "ss", "su", "sv", "sw", "ta", "th", "tl", "tn", "tr",
    "uk", "ur", "uz", "vi", "wo", "xh", "yi", "yo", "zh", "zu",
];

/// Lowercase a code and drop anything after the first `-` or `_`.
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Resolve an ISO 639-1 or ISO 639-3 code.
pub fn lookup(code: &str) -> Option<Language> {
    let normalized = normalize_code(code);
    match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => Language::from_639_3(&normalized),
        _ => None,
    }
}

pub fn is_valid_code(code: &str) -> bool {
    lookup(code).is_some()
}

/// English name for prompts; unknown codes fall back to the code itself.
pub fn display_name(code: &str) -> String {
    if normalize_code(code) == AUTO {
        return "the detected source language".to_string();
    }
    match lookup(code) {
        Some(language) => language.to_name().to_string(),
        None => code.trim().to_string(),
    }
}
