//! Spoken language detection
//!
//! Workouts mix Italian and English exercise names. Text containing an
//! accented vowel or a common Italian workout word is spoken as Italian;
//! everything else as US English.

pub const ITALIAN: &str = "it-IT";
pub const ENGLISH: &str = "en-US";

const ITALIAN_WORDS: [&str; 6] = ["mancano", "secondi", "esercizio", "istruz", "riposo", "pausa"];
const ITALIAN_ACCENTS: [char; 6] = ['à', 'è', 'é', 'ì', 'ò', 'ù'];

pub fn detect_lang(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let italian = lower.chars().any(|c| ITALIAN_ACCENTS.contains(&c))
        || ITALIAN_WORDS.iter().any(|w| lower.contains(w));

    if italian {
        ITALIAN
    } else {
        ENGLISH
    }
}

/// True when `voice_lang` belongs to `wanted` ("it-IT" matches "it_it", "it-IT-x")
pub fn lang_matches(voice_lang: &str, wanted: &str) -> bool {
    let normalize = |s: &str| s.to_lowercase().replace('_', "-");
    normalize(voice_lang).starts_with(&normalize(wanted))
}

/// Primary subtag: "it-IT" → "it"
pub fn primary_subtag(lang: &str) -> &str {
    lang.split(['-', '_']).next().unwrap_or(lang)
}
