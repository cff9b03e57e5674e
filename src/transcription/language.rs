/// Sentinel used whenever a genuine language code is unavailable
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Map a detected language name to its ISO 639-1 code
///
/// The speech-to-text service reports full language names ("english") rather
/// than codes. Names outside the supported set map to the explicit "unknown"
/// sentinel instead of a guessed code.
pub fn language_name_to_code(name: &str) -> String {
    let code = match name.trim().to_lowercase().as_str() {
        "english" => "en",
        "spanish" => "es",
        "french" => "fr",
        "german" => "de",
        "italian" => "it",
        "portuguese" => "pt",
        "japanese" => "ja",
        "korean" => "ko",
        "chinese" => "zh",
        "arabic" => "ar",
        "hindi" => "hi",
        "russian" => "ru",
        _ => UNKNOWN_LANGUAGE,
    };

    code.to_string()
}
