//! Query classifier: adapts the hybrid-search weights to the query shape.
//!
//! First match wins: file lookups lean lexical, deictic "that thing from
//! last time" queries lean semantic, error/debug queries split evenly,
//! and everything else uses the technical default. Deictic cues are
//! checked before error vocabulary so "那个 bug 怎么修" reads as a fuzzy
//! recollection rather than a debugging query.

use std::sync::LazyLock;

/// Query class with its (vector, keyword) weight pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    FileLookup,
    VagueRecall,
    ErrorDebug,
    Technical,
}

impl QueryClass {
    /// `(vector_weight, keyword_weight)` for this class.
    #[must_use]
    pub const fn weights(&self) -> (f64, f64) {
        match self {
            Self::FileLookup => (0.3, 0.7),
            Self::VagueRecall => (0.8, 0.2),
            Self::ErrorDebug => (0.5, 0.5),
            Self::Technical => (0.6, 0.4),
        }
    }

    /// Short human label for status output.
    #[must_use]
    pub const fn label(&self) -> &str {
        match self {
            Self::FileLookup => "file lookup",
            Self::VagueRecall => "vague recall",
            Self::ErrorDebug => "error debugging",
            Self::Technical => "technical",
        }
    }
}

static FILE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)[\w\-]+\.(?:py|js|ts|go|rs|java|cpp|c|h|md|json|yml|yaml|toml|sh|bash|zsh)\b|文件|file|路径|path|目录|folder|config|配置",
    )
    .expect("static regex")
});

static VAGUE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)那个|上次|之前|说过|讨论过|提过|记得|好像|大概|似乎|that thing|last time|earlier|remember|we (?:talked|discussed)",
    )
    .expect("static regex")
});

static ERROR_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)错误|error|exception|bug|崩溃|crash|fail|失败|报错|traceback|stack trace|panic|\b\d{3,4}\b",
    )
    .expect("static regex")
});

/// Classify a raw query. Precedence: file → vague → error → technical.
#[must_use]
pub fn classify(query: &str) -> QueryClass {
    if FILE_RE.is_match(query) {
        QueryClass::FileLookup
    } else if VAGUE_RE.is_match(query) {
        QueryClass::VagueRecall
    } else if ERROR_RE.is_match(query) {
        QueryClass::ErrorDebug
    } else {
        QueryClass::Technical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deictic_query_beats_error_vocabulary() {
        assert_eq!(classify("那个 bug 怎么修"), QueryClass::VagueRecall);
        assert_eq!(QueryClass::VagueRecall.weights(), (0.8, 0.2));
    }

    #[test]
    fn file_names_classify_as_lookup() {
        assert_eq!(classify("config.toml 在哪"), QueryClass::FileLookup);
        assert_eq!(classify("where is the main file"), QueryClass::FileLookup);
        assert_eq!(QueryClass::FileLookup.weights(), (0.3, 0.7));
    }

    #[test]
    fn error_vocabulary_and_codes() {
        assert_eq!(classify("traceback 500"), QueryClass::ErrorDebug);
        assert_eq!(classify("got a weird panic yesterday"), QueryClass::ErrorDebug);
        assert_eq!(QueryClass::ErrorDebug.weights(), (0.5, 0.5));
    }

    #[test]
    fn everything_else_is_technical() {
        assert_eq!(classify("how does hashmap work"), QueryClass::Technical);
        assert_eq!(QueryClass::Technical.weights(), (0.6, 0.4));
    }

    #[test]
    fn english_deixis_is_recognized() {
        assert_eq!(
            classify("that thing we discussed about caching"),
            QueryClass::VagueRecall
        );
    }
}
