//! Keyword-based relevance filter biased toward music content
//!
//! A candidate survives when its title carries none of the rejection terms
//! and either its title or its author matches an acceptance term. When too
//! few candidates survive, the filter gives up and returns the original list:
//! with sparse signal, recall matters more than precision.

use serde::Deserialize;

use crate::services::search_provider::RawResult;

/// Title terms that mark non-music content
pub const DEFAULT_REJECTED_TITLE_TERMS: &[&str] = &["trailer", "review", "reaction"];

/// Title terms that mark music content
pub const DEFAULT_ACCEPTED_TITLE_TERMS: &[&str] =
    &["official", "audio", "music", "video", "lyric", "song"];

/// Author/channel terms that mark music content
pub const DEFAULT_ACCEPTED_AUTHOR_TERMS: &[&str] = &["topic", "vevo", "official", "music"];

/// Filtered lists this short or shorter fall back to the unfiltered list
pub const DEFAULT_FALLBACK_THRESHOLD: usize = 5;

/// Raw candidates considered per search
pub const DEFAULT_CANDIDATE_LIMIT: usize = 20;

/// Tracks returned per search
pub const DEFAULT_RESULT_LIMIT: usize = 15;

/// Tunable relevance policy (`[relevance]` config section)
///
/// Terms are matched case-insensitively as substrings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelevancePolicy {
    pub rejected_title_terms: Vec<String>,
    pub accepted_title_terms: Vec<String>,
    pub accepted_author_terms: Vec<String>,
    pub fallback_threshold: usize,
    pub candidate_limit: usize,
    pub result_limit: usize,
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        fn owned(terms: &[&str]) -> Vec<String> {
            terms.iter().map(|t| t.to_string()).collect()
        }

        Self {
            rejected_title_terms: owned(DEFAULT_REJECTED_TITLE_TERMS),
            accepted_title_terms: owned(DEFAULT_ACCEPTED_TITLE_TERMS),
            accepted_author_terms: owned(DEFAULT_ACCEPTED_AUTHOR_TERMS),
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl RelevancePolicy {
    /// Whether a single candidate looks like music content
    pub fn accepts(&self, candidate: &RawResult) -> bool {
        let title = candidate.title.as_deref().unwrap_or_default().to_lowercase();
        let author = candidate.author.as_deref().unwrap_or_default().to_lowercase();

        if contains_any(&title, &self.rejected_title_terms) {
            return false;
        }

        contains_any(&title, &self.accepted_title_terms)
            || contains_any(&author, &self.accepted_author_terms)
    }

    /// Order-preserving filter with recall fallback.
    ///
    /// `_query` is accepted for callers that want query-aware policies; the
    /// keyword policy only looks at candidate titles and authors.
    pub fn filter<'a>(&self, candidates: &'a [RawResult], _query: &str) -> Vec<&'a RawResult> {
        let accepted: Vec<&RawResult> = candidates.iter().filter(|c| self.accepts(c)).collect();

        if accepted.len() > self.fallback_threshold {
            accepted
        } else {
            tracing::debug!(
                accepted = accepted.len(),
                candidates = candidates.len(),
                threshold = self.fallback_threshold,
                "Relevance filter too aggressive, using unfiltered candidates"
            );
            candidates.iter().collect()
        }
    }
}

fn contains_any(haystack: &str, terms: &[String]) -> bool {
    terms
        .iter()
        .any(|term| !term.is_empty() && haystack.contains(&term.to_lowercase()))
}
