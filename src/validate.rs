//! Unicode-category name validation for nicknames and channel names.
//!
//! Ported from the original's `check_for_categories` / `ALLOWED_CATEGORIES_*`
//! (`pyircd/utils.py`), which validates against `unicodedata.category()`
//! allow-lists. Here the same allow-lists are applied after NFC
//! normalisation, using `unicode-general-category` for the classification.

use unicode_general_category::{GeneralCategory, get_general_category};
use unicode_normalization::UnicodeNormalization;

pub const CHANNEL_PREFIX: char = '#';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    Empty,
    StartsWithChannelPrefix,
    MissingChannelPrefix,
    DisallowedChar { ch: char, category: &'static str },
}

fn category_name(cat: GeneralCategory) -> &'static str {
    match cat {
        GeneralCategory::UppercaseLetter => "Letter, Uppercase",
        GeneralCategory::LowercaseLetter => "Letter, Lowercase",
        GeneralCategory::TitlecaseLetter => "Letter, Titlecase",
        GeneralCategory::ModifierLetter => "Letter, Modifier",
        GeneralCategory::OtherLetter => "Letter, Other",
        GeneralCategory::DecimalNumber => "Number, Decimal Digit",
        GeneralCategory::LetterNumber => "Number, Letter",
        GeneralCategory::OtherNumber => "Number, Other",
        GeneralCategory::ConnectorPunctuation => "Punctuation, Connector",
        GeneralCategory::DashPunctuation => "Punctuation, Dash",
        GeneralCategory::OpenPunctuation => "Punctuation, Open",
        GeneralCategory::ClosePunctuation => "Punctuation, Close",
        GeneralCategory::InitialPunctuation => "Punctuation, Initial quote",
        GeneralCategory::FinalPunctuation => "Punctuation, Final quote",
        GeneralCategory::OtherPunctuation => "Punctuation, Other",
        _ => "Other",
    }
}

fn is_letter_or_number(cat: GeneralCategory) -> bool {
    matches!(
        cat,
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
            | GeneralCategory::DecimalNumber
            | GeneralCategory::LetterNumber
            | GeneralCategory::OtherNumber
    )
}

fn check_categories(normalised: &str, extra: impl Fn(GeneralCategory) -> bool) -> Result<(), NameError> {
    if normalised.is_empty() {
        return Err(NameError::Empty);
    }
    for ch in normalised.chars() {
        let cat = get_general_category(ch);
        if !is_letter_or_number(cat) && !extra(cat) {
            return Err(NameError::DisallowedChar {
                ch,
                category: category_name(cat),
            });
        }
    }
    Ok(())
}

/// Validates a nickname: no leading `#`, letters/numbers plus Pc/Pd/Pe only.
pub fn validate_nickname(raw: &str) -> Result<String, NameError> {
    if raw.starts_with(CHANNEL_PREFIX) {
        return Err(NameError::StartsWithChannelPrefix);
    }
    let normalised: String = raw.nfc().collect();
    check_categories(&normalised, |cat| {
        matches!(
            cat,
            GeneralCategory::ConnectorPunctuation
                | GeneralCategory::DashPunctuation
                | GeneralCategory::ClosePunctuation
        )
    })?;
    Ok(normalised)
}

/// Validates a channel name: leading `#` required, remainder letters/numbers
/// plus Pc/Pd/Pe/Po.
pub fn validate_channel_name(raw: &str) -> Result<String, NameError> {
    let Some(rest) = raw.strip_prefix(CHANNEL_PREFIX) else {
        return Err(NameError::MissingChannelPrefix);
    };
    let normalised: String = rest.nfc().collect();
    check_categories(&normalised, |cat| {
        matches!(
            cat,
            GeneralCategory::ConnectorPunctuation
                | GeneralCategory::DashPunctuation
                | GeneralCategory::ClosePunctuation
                | GeneralCategory::OtherPunctuation
        )
    })?;
    Ok(format!("{CHANNEL_PREFIX}{normalised}"))
}

/// NFC-normalises and lowercases a name for use as a registry/channel-table
/// lookup key. Two spellings of the same name that differ only in Unicode
/// normalization form (e.g. a combining accent vs. its precomposed form)
/// must resolve to the same key, so every lookup site needs to apply this
/// before consulting the table, not just the `JOIN` path that builds it.
pub fn normalize_key(raw: &str) -> String {
    raw.nfc().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_nickname() {
        assert_eq!(validate_nickname("alice").unwrap(), "alice");
    }

    #[test]
    fn accepts_unicode_letters_in_nickname() {
        assert!(validate_nickname("\u{00e9}lodie").is_ok()); // "élodie"
    }

    #[test]
    fn rejects_nickname_starting_with_hash() {
        assert_eq!(
            validate_nickname("#alice").unwrap_err(),
            NameError::StartsWithChannelPrefix
        );
    }

    #[test]
    fn rejects_empty_nickname() {
        assert_eq!(validate_nickname("").unwrap_err(), NameError::Empty);
    }

    #[test]
    fn rejects_po_category_in_nickname() {
        // '?' is Po (Punctuation, Other) - allowed for channels, not nicknames.
        let err = validate_nickname("alice?").unwrap_err();
        assert!(matches!(err, NameError::DisallowedChar { ch: '?', .. }));
    }

    #[test]
    fn accepts_plain_channel() {
        assert_eq!(validate_channel_name("#general").unwrap(), "#general");
    }

    #[test]
    fn accepts_po_category_in_channel() {
        assert_eq!(validate_channel_name("#q?a").unwrap(), "#q?a");
    }

    #[test]
    fn rejects_channel_missing_prefix() {
        assert_eq!(
            validate_channel_name("general").unwrap_err(),
            NameError::MissingChannelPrefix
        );
    }

    #[test]
    fn rejects_empty_channel_suffix() {
        assert_eq!(validate_channel_name("#").unwrap_err(), NameError::Empty);
    }

    #[test]
    fn rejects_space_in_channel() {
        let err = validate_channel_name("#a b").unwrap_err();
        assert!(matches!(err, NameError::DisallowedChar { ch: ' ', .. }));
    }

    #[test]
    fn normalize_key_unifies_decomposed_and_precomposed_forms() {
        // "e" + combining acute vs. the precomposed "\u{e9}" ("e").
        let decomposed = "#caf\u{0065}\u{0301}";
        let precomposed = "#caf\u{e9}";
        assert_eq!(normalize_key(decomposed), normalize_key(precomposed));
    }

    #[test]
    fn normalize_key_lowercases() {
        assert_eq!(normalize_key("#General"), "#general");
    }
}
