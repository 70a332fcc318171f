// Rule engine — deterministic multi-stage spam detection.
//
// Stages run in a fixed order and the first decisive stage wins:
//   1. exclusions   (benign replies; terminal, never suspicious)
//   2. patterns     (high-signal phrases, shouting, links to other chats)
//   3. heuristics   (scored keyword predicates, each isolated from the others)
//
// Matching never fails as a whole. A heuristic that errors is logged and
// treated as "no match" so the remaining ones still run.

pub mod heuristics;
pub mod lexicon;
pub mod patterns;

use serde::Serialize;
use tracing::{debug, warn};

use crate::message::AuthorInfo;
use heuristics::Heuristic;

/// Which stage produced a rule result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStage {
    Exclusion,
    Pattern,
    Heuristic,
}

/// Outcome of running the rule engine over one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// True if the message is suspicious by rule.
    pub matched: bool,
    /// Short label for what decided the result, e.g. `heuristic:gift_score`.
    pub reason: Option<String>,
    pub stage: Option<RuleStage>,
}

impl MatchResult {
    fn no_match() -> Self {
        Self {
            matched: false,
            reason: None,
            stage: None,
        }
    }

    fn excluded(name: &str) -> Self {
        Self {
            matched: false,
            reason: Some(format!("exclusion:{name}")),
            stage: Some(RuleStage::Exclusion),
        }
    }

    fn hit(stage: RuleStage, reason: String) -> Self {
        Self {
            matched: true,
            reason: Some(reason),
            stage: Some(stage),
        }
    }

    /// True if an exclusion pattern decided this result.
    pub fn is_excluded(&self) -> bool {
        self.stage == Some(RuleStage::Exclusion)
    }
}

/// Precomputed views of a message shared by every heuristic.
#[derive(Debug, Clone)]
pub struct MessageFeatures {
    pub raw: String,
    /// Lowercased with whitespace runs collapsed to single spaces
    pub lower: String,
    /// Lowercased words stripped of surrounding punctuation
    pub tokens: Vec<String>,
    /// Whitespace-separated pieces, links included
    pub word_count: usize,
    pub link_count: usize,
    pub char_len: usize,
    pub is_question: bool,
}

impl MessageFeatures {
    pub fn new(text: &str) -> Self {
        let pieces: Vec<&str> = text.split_whitespace().collect();
        let lower = pieces.join(" ").to_lowercase();

        let tokens = lower
            .split(' ')
            .map(|p| p.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '@')))
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        let link_count = pieces.iter().filter(|p| is_link_like(p)).count();

        Self {
            raw: text.to_string(),
            is_question: lower.contains('?'),
            lower,
            tokens,
            word_count: pieces.len(),
            link_count,
            char_len: text.chars().count(),
        }
    }
}

/// Top-level domains that make a bare `word.tld` token count as a link.
const LINK_TLDS: &[&str] = &[
    "ru", "com", "net", "org", "me", "io", "xyz", "info", "top", "link", "site", "online", "club",
    "shop", "su", "app",
];

/// Whether a whitespace-delimited token looks like a link.
pub fn is_link_like(piece: &str) -> bool {
    let p = piece
        .trim_matches(|c: char| "()[]<>\"'.,!?;:«»".contains(c))
        .to_lowercase();
    if p.starts_with("http://") || p.starts_with("https://") || p.starts_with("www.") {
        return true;
    }
    if p.contains("t.me/") || p.contains("telegram.me/") {
        return true;
    }

    let host = p.split('/').next().unwrap_or("");
    if !host.contains('.')
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return false;
    }
    let mut labels = host.split('.');
    let tld = labels.next_back().unwrap_or("");
    labels.all(|l| !l.is_empty()) && LINK_TLDS.contains(&tld)
}

/// Deterministic rule-based detector.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    /// Handle of the monitored channel (without '@'); links to it are self-mentions.
    home_channel: Option<String>,
}

impl RuleEngine {
    pub fn new(home_channel: Option<String>) -> Self {
        Self {
            home_channel: home_channel
                .map(|h| h.trim_start_matches('@').to_lowercase())
                .filter(|h| !h.is_empty()),
        }
    }

    /// Run every stage over `text` in order.
    pub fn evaluate(&self, text: &str, author: &AuthorInfo) -> MatchResult {
        if text.trim().is_empty() {
            return MatchResult::no_match();
        }
        let msg = MessageFeatures::new(text);

        // Stage 1: exclusions
        if let Some(ex) = patterns::EXCLUSIONS.iter().find(|ex| ex.applies(&msg.lower)) {
            debug!(exclusion = ex.name(), "Message matches exclusion");
            return MatchResult::excluded(ex.name());
        }

        // Stage 2: high-signal patterns
        let author_handle = author.username.as_deref().map(str::to_lowercase);
        let own: Vec<&str> = self
            .home_channel
            .as_deref()
            .into_iter()
            .chain(author_handle.as_deref())
            .collect();
        if let Some(dest) = patterns::external_chat_link(&msg.lower, &own) {
            return MatchResult::hit(RuleStage::Pattern, format!("pattern:external_link:{dest}"));
        }
        if let Some(p) = patterns::SIGNALS.iter().find(|p| p.is_match(&msg.lower)) {
            return MatchResult::hit(RuleStage::Pattern, format!("pattern:{}", p.name));
        }
        if patterns::longest_caps_run(&msg.raw) >= patterns::CAPS_RUN_MIN {
            return MatchResult::hit(RuleStage::Pattern, "pattern:caps_run".to_string());
        }

        // Stage 3: heuristics
        evaluate_heuristics(heuristics::REGISTRY, &msg, author)
    }
}

/// Run `heuristics` in order; the first one that fires decides.
///
/// A heuristic that returns `Err` is logged and counted as "no match", and
/// the ones after it still run.
pub fn evaluate_heuristics(
    heuristics: &[&dyn Heuristic],
    msg: &MessageFeatures,
    author: &AuthorInfo,
) -> MatchResult {
    for h in heuristics {
        match h.check(msg, author) {
            Ok(true) => {
                return MatchResult::hit(RuleStage::Heuristic, format!("heuristic:{}", h.name()))
            }
            Ok(false) => {}
            Err(e) => warn!(heuristic = h.name(), error = %e, "Heuristic failed; skipping"),
        }
    }
    MatchResult::no_match()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> AuthorInfo {
        AuthorInfo {
            id: 42,
            username: Some("someone".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_features_tokenize_and_count_links() {
        let f = MessageFeatures::new("Привет,  МИР! смотри https://x.com?");
        assert_eq!(f.lower, "привет, мир! смотри https://x.com?");
        assert_eq!(f.tokens[0], "привет");
        assert_eq!(f.word_count, 4);
        assert_eq!(f.link_count, 1);
        assert!(f.is_question);
    }

    #[test]
    fn test_link_like() {
        assert!(is_link_like("https://example.com/path"));
        assert!(is_link_like("t.me/channel"));
        assert!(is_link_like("(example.ru)"));
        assert!(is_link_like("www.site"));
        assert!(!is_link_like("т.е."));
        assert!(!is_link_like("3.14"));
        assert!(!is_link_like("hello"));
    }

    #[test]
    fn test_empty_text_never_matches() {
        let engine = RuleEngine::default();
        assert_eq!(engine.evaluate("   ", &author()), MatchResult::no_match());
    }

    #[test]
    fn test_exclusion_is_terminal() {
        let engine = RuleEngine::default();
        // Would hit the exclamation pattern if exclusions didn't win
        let r = engine.evaluate("Спасибо!!!", &author());
        assert!(!r.matched);
        assert!(r.is_excluded());
        assert_eq!(r.reason.as_deref(), Some("exclusion:gratitude"));
    }

    #[test]
    fn test_pattern_stage_reasons() {
        let engine = RuleEngine::default();
        let r = engine.evaluate("забери подарок бесплатно сейчас", &author());
        assert!(r.matched);
        assert_eq!(r.stage, Some(RuleStage::Pattern));
        assert_eq!(r.reason.as_deref(), Some("pattern:urgency"));

        let r = engine.evaluate("СРОЧНО смотрите", &author());
        assert_eq!(r.reason.as_deref(), Some("pattern:caps_run"));
    }

    #[test]
    fn test_self_links_are_not_external() {
        let engine = RuleEngine::new(Some("@HomeChannel".to_string()));
        let r = engine.evaluate("мой пост в t.me/homechannel про котиков, читайте все", &author());
        assert!(!r.matched, "unexpected match: {:?}", r.reason);

        let r = engine.evaluate("а ещё t.me/freegifts", &author());
        assert_eq!(r.reason.as_deref(), Some("pattern:external_link:freegifts"));
    }

    #[test]
    fn test_heuristic_stage() {
        let engine = RuleEngine::default();
        let r = engine.evaluate("подпишись на канал", &author());
        assert_eq!(r.stage, Some(RuleStage::Heuristic));
        assert_eq!(r.reason.as_deref(), Some("heuristic:call_to_action"));
    }

    #[test]
    fn test_ordinary_message_passes() {
        let engine = RuleEngine::default();
        let r = engine.evaluate("Отличный пост, спасибо автору за разбор", &author());
        assert!(!r.matched);
        assert_eq!(r.stage, None);
    }
}
