// Regex sets for the first two rule stages: exclusions and high-signal patterns.
//
// All patterns run against the lowercased text (regex-lite has no Unicode
// case folding, so we fold before matching). Pattern sets compile once, on
// first use. A pattern that fails to compile is logged once and skipped; it
// never takes the rest of the set down with it.

use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::warn;

use super::lexicon;

/// A compiled pattern with a stable name used in match reasons.
pub struct NamedPattern {
    pub name: &'static str,
    regex: Option<Regex>,
}

impl NamedPattern {
    fn compile(name: &'static str, source: &str) -> Self {
        let regex = match Regex::new(source) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(pattern = name, error = %e, "Rule pattern failed to compile; skipping it");
                None
            }
        };
        Self { name, regex }
    }

    /// False for patterns that failed to compile.
    pub fn is_match(&self, lower: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(lower))
    }
}

/// A benign-reply pattern. A guarded exclusion is vetoed when the same text
/// also carries giveaway pitch vocabulary, so "спасибо" can't front a pitch.
pub struct Exclusion {
    pattern: NamedPattern,
    guarded: bool,
}

impl Exclusion {
    pub fn name(&self) -> &'static str {
        self.pattern.name
    }

    pub fn applies(&self, lower: &str) -> bool {
        self.pattern.is_match(lower) && !(self.guarded && carries_pitch(lower))
    }
}

/// Replies that share vocabulary with spam but are legitimate. Ordered; the
/// first one that applies ends evaluation with a benign result.
///
/// Interrogatives are anchored on both sides: "какой" is not "как".
pub static EXCLUSIONS: LazyLock<Vec<Exclusion>> = LazyLock::new(|| {
    [
        (
            "contest_closed",
            r"(конкурс|розыгрыш|раздача)\s+(окончен|закончен|завершен|завершён)",
            false,
        ),
        ("results_announced", r"итоги\s+(конкурса|розыгрыша)", false),
        (
            "where_is_my_prize",
            r"(^|[\s,.!(])(где|когда)\s+(мой|моя|мои|наш|наши)\s+(приз|подар|выигрыш)",
            false,
        ),
        (
            "gratitude",
            r"^(большое\s+|огромное\s+)?(спасибо|благодарю|спс|thanks|thank\s+you)([\s,!.)(]+[^\s/@]+){0,4}[\s!.,)(]*$",
            true,
        ),
        (
            "yes_no",
            r"^(да|нет|ага|неа|угу|конечно|yes|no|ok|ок|окей)[\s!.,)(]*$",
            false,
        ),
        (
            "contest_question",
            r"(^|[\s,.!(])(когда|где|как|сколько|во\s+сколько)[\s,][^?]*(розыгрыш|конкурс|итог|результат|победител|приз)[^?]*\?",
            true,
        ),
    ]
    .into_iter()
    .map(|(name, source, guarded)| Exclusion {
        pattern: NamedPattern::compile(name, source),
        guarded,
    })
    .collect()
});

/// High-signal phrases: any hit is suspicious. Link detection and the
/// capitalization check live outside this list because they need more than
/// a yes/no match.
pub static SIGNALS: LazyLock<Vec<NamedPattern>> = LazyLock::new(|| {
    [
        // Urgency / call to action
        ("urgency", r"забери\s+подарок"),
        ("urgency", r"получи\s+бесплатно"),
        ("urgency", r"успей\s+забрать"),
        ("urgency", r"только\s+сегодня"),
        ("urgency", r"переходи\s+по\s+ссылке"),
        // Scam templates
        ("scam_template", r"бесплатн[ыо][еёй]\s+подарк[иа]"),
        ("scam_template", r"разда[юу]т?\s+подарк[иа]"),
        ("scam_template", r"халяв[аы]\s+подарк[иа]"),
        ("scam_template", r"промокод\s+на\s+подарок"),
        ("scam_template", r"бот\s+раздает"),
        // Shouting
        ("exclamation_run", r"!{3,}"),
    ]
    .into_iter()
    .map(|(name, source)| NamedPattern::compile(name, source))
    .collect()
});

/// Links to other chats/channels. Group 1 is the destination handle.
static CHAT_LINK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    match Regex::new(r"(?:t\.me|telegram\.me|telegram\.dog)/(?:joinchat/|\+)?([a-z0-9_]+)") {
        Ok(r) => Some(r),
        Err(e) => {
            warn!(error = %e, "Chat link pattern failed to compile; link check disabled");
            None
        }
    }
});

/// True if `lower` contains a pitch: a non-shouting signal phrase, free-stuff
/// vocabulary, or a known scam template.
pub fn carries_pitch(lower: &str) -> bool {
    SIGNALS
        .iter()
        .filter(|p| p.name != "exclamation_run")
        .any(|p| p.is_match(lower))
        || lexicon::contains_any(lower, lexicon::FREE)
        || lexicon::contains_any(lower, lexicon::SCAM_PHRASES)
}

/// Minimum run of consecutive uppercase letters that counts as shouting.
pub const CAPS_RUN_MIN: usize = 5;

/// First link to an external chat whose destination is not one of `own_handles`.
///
/// A link to the channel itself (or to the author's own handle) is a bare
/// self-mention and doesn't count.
pub fn external_chat_link<'a>(lower: &'a str, own_handles: &[&str]) -> Option<&'a str> {
    let re = CHAT_LINK.as_ref()?;
    re.captures_iter(lower)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .find(|dest| !own_handles.iter().any(|own| own.eq_ignore_ascii_case(dest)))
}

/// Length of the longest run of consecutive uppercase letters.
pub fn longest_caps_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c.is_uppercase() {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
