//! Language code helpers used by configuration validation and prompts.
//!
//! Accepts ISO 639-1 (2-letter) and ISO 639-2 (3-letter, T or B form)
//! codes, plus the special source code `auto` for detected languages.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Code used when the source language should be detected by the provider
pub const AUTO_DETECT: &str = "auto";

// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

fn lookup(code: &str) -> Option<Language> {
    let code = code.trim().to_lowercase();
    match code.len() {
        2 => Language::from_639_1(&code),
        3 => {
            let terminology = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == code)
                .map(|(_, t)| *t)
                .unwrap_or(code.as_str());
            Language::from_639_3(terminology)
        }
        _ => None,
    }
}

/// Validate a target language code
pub fn validate_language_code(code: &str) -> Result<()> {
    lookup(code)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Validate a source language code, which may also be `auto`
pub fn validate_source_language(code: &str) -> Result<()> {
    if is_auto(code) {
        return Ok(());
    }
    validate_language_code(code)
}

/// Whether the code asks for automatic detection
pub fn is_auto(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(AUTO_DETECT)
}

/// Normalize to the 2-letter code when one exists, else the 3-letter code.
///
/// Machine translation APIs expect this form.
pub fn to_api_code(code: &str) -> Result<String> {
    let lang = lookup(code).ok_or_else(|| anyhow!("Invalid language code: {}", code))?;
    Ok(lang
        .to_639_1()
        .map(|c| c.to_string())
        .unwrap_or_else(|| lang.to_639_3().to_string()))
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (lookup(code1), lookup(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// English name for prompts; falls back to the raw code when unknown
pub fn display_name(code: &str) -> String {
    if is_auto(code) {
        return "the source language".to_string();
    }
    lookup(code)
        .map(|lang| lang.to_name().to_string())
        .unwrap_or_else(|| code.to_string())
}
