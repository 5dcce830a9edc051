//! Languages offered for translation

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// English display name, also what goes into the prompt
    pub name: &'static str,
    pub code: &'static str,
}

const fn language(name: &'static str, code: &'static str) -> Language {
    Language { name, code }
}

pub static LANGUAGES: [Language; 20] = [
    language("Arabic", "ar"),
    language("Bengali", "bn"),
    language("Chinese (Simplified)", "zh-CN"),
    language("Chinese (Traditional)", "zh-TW"),
    language("Dutch", "nl"),
    language("English", "en"),
    language("French", "fr"),
    language("German", "de"),
    language("Hindi", "hi"),
    language("Indonesian", "id"),
    language("Italian", "it"),
    language("Japanese", "ja"),
    language("Korean", "ko"),
    language("Portuguese", "pt"),
    language("Russian", "ru"),
    language("Spanish", "es"),
    language("Swedish", "sv"),
    language("Thai", "th"),
    language("Turkish", "tr"),
    language("Vietnamese", "vi"),
];

/// Find a language by display name or code, ignoring ASCII case
pub fn lookup(name_or_code: &str) -> Option<&'static Language> {
    let needle = name_or_code.trim();
    LANGUAGES.iter().find(|language| {
        language.name.eq_ignore_ascii_case(needle) || language.code.eq_ignore_ascii_case(needle)
    })
}

/// Display name for a code or name; unknown input is passed through
pub fn display_name(name_or_code: &str) -> &str {
    lookup(name_or_code).map_or(name_or_code.trim(), |language| language.name)
}
