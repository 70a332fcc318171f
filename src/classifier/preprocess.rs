// Text normalization shared by training, incremental training and prediction.
//
// Every path into the vectorizer goes through `preprocess`; there is no
// second copy of these rules anywhere in the crate.

use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::warn;

pub const URL_TOKEN: &str = "[url]";
pub const USER_TOKEN: &str = "[user]";
pub const NUM_TOKEN: &str = "[num]";

struct Replacement {
    regex: Option<Regex>,
    with: String,
}

impl Replacement {
    fn new(source: &str, token: &str) -> Self {
        let regex = Regex::new(source)
            .map_err(|e| warn!(pattern = source, error = %e, "Preprocess pattern failed to compile"))
            .ok();
        Self {
            regex,
            with: format!(" {token} "),
        }
    }

    fn apply(&self, text: String) -> String {
        match &self.regex {
            Some(re) => re.replace_all(&text, self.with.as_str()).into_owned(),
            None => text,
        }
    }
}

// Links first: a handle or a digit inside a URL belongs to the URL.
static REPLACEMENTS: LazyLock<[Replacement; 3]> = LazyLock::new(|| {
    [
        Replacement::new(
            r"https?://\S+|www\.\S+|t\.me/\S+|telegram\.me/\S+",
            URL_TOKEN,
        ),
        Replacement::new(r"@\w+", USER_TOKEN),
        Replacement::new(r"\d+", NUM_TOKEN),
    ]
});

/// Normalize a message before vectorization.
///
/// Lowercases, replaces links, `@handle` mentions and digit runs with
/// placeholder tokens, and collapses whitespace.
pub fn preprocess(text: &str) -> String {
    let text = REPLACEMENTS
        .iter()
        .fold(text.to_lowercase(), |acc, r| r.apply(acc));
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
