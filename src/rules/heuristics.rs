// Scored keyword heuristics — the third rule stage.
//
// Each heuristic is a plain function over `MessageFeatures` so it can be
// called and tested on its own. The `Heuristic` trait wraps them for the
// engine, and `REGISTRY` fixes the order they run in. New heuristics are
// added by extending the registry; there is no runtime registration.

use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex_lite::Regex;

use super::lexicon::{
    contains_any, count_present, has_word, ACTION_WORDS, BROADCAST, COMMON_WORDS, CONTEST,
    CONTEST_CONTEXT, FREE, GIFT_PRIMARY, GIFT_SECONDARY, GIVEAWAY, GIVEAWAY_ACTIONS, GRATITUDE,
    INTERROGATIVE_WORDS, PRIZE_WORDS, SCAM_PHRASES,
};
use super::MessageFeatures;
use crate::message::AuthorInfo;

/// Messages longer than this (in characters) are "long" and skip the emoji check.
pub const LONG_MESSAGE_CHARS: usize = 50;

/// Gift score at or above which a message is a gift pitch.
pub const GIFT_SCORE_THRESHOLD: u32 = 3;

/// Maximum share of common-speech tokens for a gift pitch.
pub const GIFT_COMMON_WORD_MAX_RATIO: f64 = 0.5;

/// A single yes/no predicate in the rule engine.
pub trait Heuristic: Send + Sync {
    /// Stable name, used in match reasons and logs.
    fn name(&self) -> &'static str;

    /// Whether the message looks suspicious. An `Err` is logged by the
    /// engine and counted as "no match".
    fn check(&self, msg: &MessageFeatures, author: &AuthorInfo) -> Result<bool>;
}

// --- Gift detection ---

/// Weighted gift score: +2 primary keyword, +1 per secondary keyword,
/// +1 per contest-context keyword, +2 when a link is present.
pub fn gift_score(msg: &MessageFeatures) -> u32 {
    let mut score = 0;
    if contains_any(&msg.lower, GIFT_PRIMARY) {
        score += 2;
    }
    score += count_present(&msg.lower, GIFT_SECONDARY) as u32;
    score += count_present(&msg.lower, CONTEST_CONTEXT) as u32;
    if msg.link_count > 0 {
        score += 2;
    }
    score
}

/// Share of tokens that are common-speech words.
pub fn common_word_ratio(msg: &MessageFeatures) -> f64 {
    if msg.tokens.is_empty() {
        return 0.0;
    }
    let common = msg
        .tokens
        .iter()
        .filter(|t| COMMON_WORDS.contains(t.as_str()))
        .count();
    common as f64 / msg.tokens.len() as f64
}

pub fn is_gift_pitch(msg: &MessageFeatures) -> bool {
    msg.tokens.len() >= 3
        && gift_score(msg) >= GIFT_SCORE_THRESHOLD
        && common_word_ratio(msg) <= GIFT_COMMON_WORD_MAX_RATIO
}

// --- Giveaway detection ---

pub fn is_giveaway_pitch(msg: &MessageFeatures) -> bool {
    contains_any(&msg.lower, GIVEAWAY)
        && contains_any(&msg.lower, GIVEAWAY_ACTIONS)
        && !has_word(&msg.tokens, INTERROGATIVE_WORDS)
}

// --- Free stuff ---

pub fn is_free_offer(msg: &MessageFeatures) -> bool {
    contains_any(&msg.lower, FREE) && !contains_any(&msg.lower, GRATITUDE) && !msg.is_question
}

// --- Emoji density ---

/// Emoji codepoint ranges: emoticons, pictographs, transport, flags,
/// dingbats, misc symbols, supplemental symbols.
pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F600..=0x1F64F
            | 0x1F300..=0x1F5FF
            | 0x1F680..=0x1F6FF
            | 0x1F1E0..=0x1F1FF
            | 0x2600..=0x26FF
            | 0x2700..=0x27BF
            | 0x1F900..=0x1F9FF
            | 0x1FA70..=0x1FAFF
    )
}

pub fn is_emoji_heavy(msg: &MessageFeatures) -> bool {
    let len = msg.char_len;
    if len == 0 || len > LONG_MESSAGE_CHARS {
        return false;
    }
    let count = msg.raw.chars().filter(|c| is_emoji(*c)).count();
    let ratio = count as f64 / len as f64;
    (count > 5 && len < 50) || (ratio > 0.3 && len < 100)
}

// --- Spam / call to action ---

pub fn is_call_to_action(msg: &MessageFeatures) -> bool {
    contains_any(&msg.lower, BROADCAST)
        || (has_word(&msg.tokens, ACTION_WORDS) && msg.link_count > 0)
}

// --- Contest mention ---

pub fn is_contest_mention(msg: &MessageFeatures) -> bool {
    (contains_any(&msg.lower, CONTEST) || has_word(&msg.tokens, PRIZE_WORDS)) && !msg.is_question
}

// --- URL density ---

pub fn is_link_heavy(msg: &MessageFeatures) -> bool {
    msg.link_count > 1 || (msg.link_count == 1 && msg.word_count < 5)
}

// --- Known-channel redirection ---

static MENTION: LazyLock<std::result::Result<Regex, regex_lite::Error>> =
    LazyLock::new(|| Regex::new(r"(^|\s)@[a-z0-9_]{3,}"));

pub fn is_channel_redirect(msg: &MessageFeatures) -> Result<bool> {
    let mention = MENTION
        .as_ref()
        .map_err(|e| anyhow!("mention pattern unavailable: {e}"))?;
    Ok(mention.is_match(&msg.lower) && contains_any(&msg.lower, BROADCAST))
}

// --- Template scam phrases ---

pub fn contains_scam_phrase(msg: &MessageFeatures) -> bool {
    SCAM_PHRASES.iter().any(|p| msg.lower.contains(p))
}

// --- Registry ---

macro_rules! infallible_heuristic {
    ($ty:ident, $name:literal, $func:ident) => {
        pub struct $ty;

        impl Heuristic for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn check(&self, msg: &MessageFeatures, _author: &AuthorInfo) -> Result<bool> {
                Ok($func(msg))
            }
        }
    };
}

infallible_heuristic!(GiftPitch, "gift_score", is_gift_pitch);
infallible_heuristic!(GiveawayPitch, "giveaway", is_giveaway_pitch);
infallible_heuristic!(FreeOffer, "free_stuff", is_free_offer);
infallible_heuristic!(EmojiDensity, "emoji_density", is_emoji_heavy);
infallible_heuristic!(CallToAction, "call_to_action", is_call_to_action);
infallible_heuristic!(ContestMention, "contest_mention", is_contest_mention);
infallible_heuristic!(UrlDensity, "url_density", is_link_heavy);
infallible_heuristic!(ScamPhrase, "scam_phrase", contains_scam_phrase);

pub struct ChannelRedirect;

impl Heuristic for ChannelRedirect {
    fn name(&self) -> &'static str {
        "channel_redirect"
    }

    fn check(&self, msg: &MessageFeatures, _author: &AuthorInfo) -> Result<bool> {
        is_channel_redirect(msg)
    }
}

/// Every heuristic, in evaluation order.
pub static REGISTRY: &[&dyn Heuristic] = &[
    &GiftPitch,
    &GiveawayPitch,
    &FreeOffer,
    &EmojiDensity,
    &CallToAction,
    &ContestMention,
    &UrlDensity,
    &ChannelRedirect,
    &ScamPhrase,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn f(text: &str) -> MessageFeatures {
        MessageFeatures::new(text)
    }

    #[test]
    fn test_gift_score_components() {
        // primary (+2) + free (+1)
        assert_eq!(gift_score(&f("забери подарок бесплатно сейчас")), 3);
        // primary (+2) + link (+2)
        assert_eq!(gift_score(&f("подарок тут t.me/x")), 4);
        assert_eq!(gift_score(&f("хорошая погода")), 0);
    }

    #[test]
    fn test_gift_requires_three_tokens() {
        assert!(!is_gift_pitch(&f("подарок бесплатно")));
    }

    #[test]
    fn test_gift_guarded_by_common_words() {
        // Score 3, but mostly ordinary speech
        assert!(!is_gift_pitch(&f("я не знаю что он мне на подарок бесплатно")));
        assert!(is_gift_pitch(&f("забери подарок бесплатно сейчас")));
    }

    #[test]
    fn test_giveaway_question_is_benign() {
        assert!(is_giveaway_pitch(&f("розыгрыш призов, участвуй скорее")));
        assert!(!is_giveaway_pitch(&f("когда розыгрыш, кто участвует")));
    }

    #[test]
    fn test_free_offer() {
        assert!(is_free_offer(&f("халява для всех")));
        assert!(!is_free_offer(&f("спасибо за бесплатный совет")));
        assert!(!is_free_offer(&f("это бесплатно?")));
    }

    #[test]
    fn test_emoji_density() {
        assert!(is_emoji_heavy(&f("🎁🎁🎁🎁🎁🎁 тут")));
        assert!(is_emoji_heavy(&f("🎁🔥💰 ок")));
        assert!(!is_emoji_heavy(&f("хорошего дня 🙂")));
        // Long messages skip the check entirely
        let long = format!("{} {}", "🎁".repeat(10), "a".repeat(60));
        assert!(!is_emoji_heavy(&f(&long)));
    }

    #[test]
    fn test_call_to_action() {
        assert!(is_call_to_action(&f("подпишись на канал")));
        assert!(is_call_to_action(&f("жми https://example.com")));
        assert!(!is_call_to_action(&f("жми на газ")));
    }

    #[test]
    fn test_contest_mention() {
        assert!(is_contest_mention(&f("у нас конкурс с призами")));
        assert!(!is_contest_mention(&f("какой конкурс?")));
        assert!(!is_contest_mention(&f("признаю, был неправ")));
    }

    #[test]
    fn test_link_density() {
        assert!(is_link_heavy(&f("https://a.com https://b.com")));
        assert!(is_link_heavy(&f("смотри example.ru")));
        assert!(!is_link_heavy(&f(
            "вот подробная статья на example.ru про рецепты пирогов"
        )));
    }

    #[test]
    fn test_channel_redirect() {
        assert!(is_channel_redirect(&f("вступай в @gift_channel")).unwrap());
        assert!(!is_channel_redirect(&f("спроси у @admin")).unwrap());
    }

    #[test]
    fn test_scam_phrase() {
        assert!(contains_scam_phrase(&f("Поздравляем, вы   выиграли!")));
        assert!(!contains_scam_phrase(&f("мы выиграли матч")));
    }

    #[test]
    fn test_registry_names_unique() {
        let mut names: Vec<&str> = REGISTRY.iter().map(|h| h.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), REGISTRY.len());
    }
}
