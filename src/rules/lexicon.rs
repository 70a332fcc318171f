// Keyword lists for the scored heuristics.
//
// Stems are matched as substrings of the lowercased text, so "подар" covers
// подарок / подарки / подарю. Entries in the *_WORDS lists are matched against
// whole tokens only, because short verbs like "go" or "жми" would otherwise
// fire inside unrelated words.

use std::collections::HashSet;
use std::sync::LazyLock;

use stop_words::{get, LANGUAGE};

/// Primary gift/giveaway vocabulary (+2 to the gift score).
pub const GIFT_PRIMARY: &[&str] = &["подар", "гифт", "гив", "gift", "giveaway"];

/// "Free"/"bonus"-class vocabulary (+1 each to the gift score).
pub const GIFT_SECONDARY: &[&str] = &["бесплатн", "халяв", "даром", "бонус", "free", "bonus"];

/// Contest context (+1 each to the gift score).
pub const CONTEST_CONTEXT: &[&str] = &[
    "розыгр", "конкурс", "приз", "выигр", "участв", "побед", "contest",
];

/// Giveaway-class vocabulary for the giveaway heuristic.
pub const GIVEAWAY: &[&str] = &["разда", "розыгр", "giveaway"];

/// "Take part" / "win" actions that turn a giveaway mention into a pitch.
pub const GIVEAWAY_ACTIONS: &[&str] = &["участв", "выигр", "побед", "win", "participate"];

/// Interrogatives that mark a benign question about a giveaway.
pub const INTERROGATIVE_WORDS: &[&str] = &["когда", "где", "when", "where"];

/// Free-stuff vocabulary.
pub const FREE: &[&str] = &["бесплатн", "халяв", "даром", "free"];

/// Gratitude markers; a thank-you mentioning "free" is a reply, not a pitch.
pub const GRATITUDE: &[&str] = &["спасибо", "благодар", "спс", "thank"];

/// Broadcast-style calls: subscribe / join.
pub const BROADCAST: &[&str] = &[
    "подпишись",
    "подписывайся",
    "подписывайтесь",
    "вступай",
    "присоединяйся",
    "subscribe",
    "join",
    "@channel",
    "@everyone",
];

/// Action verbs that are only suspicious next to a link.
pub const ACTION_WORDS: &[&str] = &[
    "жми", "жмите", "кликай", "переходи", "переходите", "заходи", "click", "follow", "go",
];

/// Contest vocabulary for the contest-mention heuristic (stems).
pub const CONTEST: &[&str] = &["конкурс", "розыгрыш", "contest"];

/// Whole-word prize terms ("приз" as a stem would match "признаю").
pub const PRIZE_WORDS: &[&str] = &["приз", "призы", "призов", "prize"];

/// Exact scam templates seen verbatim in the wild.
pub const SCAM_PHRASES: &[&str] = &[
    "бот раздает подарки",
    "вы выиграли",
    "вы стали победителем",
    "заберите свой приз",
    "ваш подарок ждет",
    "получите подарок бесплатно",
    "you have won",
    "claim your prize",
];

/// Common-speech words. A message dominated by these is ordinary conversation
/// that happens to mention a gift.
pub static COMMON_WORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    let mut words: HashSet<String> = get(LANGUAGE::Russian).into_iter().collect();
    words.extend(get(LANGUAGE::English));
    words
});

/// True if any stem occurs as a substring of `lower`.
pub fn contains_any(lower: &str, stems: &[&str]) -> bool {
    stems.iter().any(|stem| lower.contains(stem))
}

/// Number of distinct stems that occur in `lower`.
pub fn count_present(lower: &str, stems: &[&str]) -> usize {
    stems.iter().filter(|stem| lower.contains(*stem)).count()
}

/// True if any token equals one of `words`.
pub fn has_word(tokens: &[String], words: &[&str]) -> bool {
    tokens.iter().any(|t| words.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stems_match_inflections() {
        assert!(contains_any("забери подарки", GIFT_PRIMARY));
        assert!(contains_any("бесплатная доставка", FREE));
        assert!(!contains_any("обычный текст", GIFT_PRIMARY));
    }

    #[test]
    fn test_count_present_counts_distinct_stems() {
        assert_eq!(count_present("бонус и халява, халява", GIFT_SECONDARY), 2);
    }

    #[test]
    fn test_has_word_is_whole_token() {
        let tokens = vec!["good".to_string(), "morning".to_string()];
        assert!(!has_word(&tokens, ACTION_WORDS));
        let tokens = vec!["go".to_string()];
        assert!(has_word(&tokens, ACTION_WORDS));
    }

    #[test]
    fn test_common_words_cover_basic_russian() {
        assert!(COMMON_WORDS.contains("и"));
        assert!(COMMON_WORDS.contains("the"));
        assert!(!COMMON_WORDS.contains("подарок"));
    }
}
