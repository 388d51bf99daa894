use serde::{Deserialize, Serialize};
use url::Url;

/// Pattern that enables enforcement on every page.
pub const WILDCARD: &str = "*";

/// URL substrings deciding whether enforcement activates on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationPatterns(Vec<String>);

/// Outcome of evaluating [`ActivationPatterns`] against a page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Wildcard,
    Matched(String),
    /// No patterns configured; enforcement activates anyway.
    Unconfigured,
    Skipped,
}

impl GateDecision {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

impl ActivationPatterns {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(patterns.into_iter().map(Into::into).collect())
    }

    pub fn wildcard() -> Self {
        Self(vec![WILDCARD.to_string()])
    }

    pub fn patterns(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|pattern| pattern == WILDCARD)
    }

    pub fn evaluate(&self, url: &Url) -> GateDecision {
        if self.is_wildcard() {
            return GateDecision::Wildcard;
        }
        if self.0.is_empty() {
            return GateDecision::Unconfigured;
        }
        let href = url.as_str();
        self.0
            .iter()
            .find(|pattern| href.contains(pattern.as_str()))
            .map(|pattern| GateDecision::Matched(pattern.clone()))
            .unwrap_or(GateDecision::Skipped)
    }
}
