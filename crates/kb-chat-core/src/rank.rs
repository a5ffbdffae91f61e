//! Keyword ranker for the knowledge-base corpus.
//!
//! Pure function of its inputs; safe to call concurrently against a shared
//! [`Corpus`].
//!
//! # Algorithm
//!
//! 1. Lowercase the query and split on whitespace. Duplicate terms are kept.
//! 2. Score each fragment by counting the query terms that occur as a
//!    substring of its lowercased content (`"price"` matches `"prices"`).
//! 3. Drop fragments scoring `0`.
//! 4. Stable sort by score (desc); equal scores keep corpus order.
//! 5. For `license_recommendation`, move fragments whose topic or source
//!    contains `"fee"` (case-insensitive) ahead of the rest, preserving
//!    relative order within both groups.
//! 6. Keep the first `top_k` and render each as `"[{topic}] {content}"`,
//!    joined by a blank line.

use serde::Serialize;

use crate::corpus::Corpus;
use crate::models::{Fragment, ScoredFragment};
use crate::persona::AgentType;

/// Number of fragments placed into the context when the caller has no budget.
pub const DEFAULT_TOP_K: usize = 3;

const FEE_MARKER: &str = "fee";

/// Output of [`rank`]: the rendered context block and whether anything matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Retrieval {
    pub context: String,
    pub matched: bool,
}

impl Retrieval {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Lowercased whitespace-separated query terms, duplicates included.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Counts the terms that occur anywhere in `content` (case-insensitive).
pub fn score_content(terms: &[String], content: &str) -> usize {
    let haystack = content.to_lowercase();
    terms
        .iter()
        .filter(|t| haystack.contains(t.as_str()))
        .count()
}

fn is_fee_fragment(fragment: &Fragment) -> bool {
    fragment.topic.to_lowercase().contains(FEE_MARKER)
        || fragment.source.to_lowercase().contains(FEE_MARKER)
}

/// Scores, filters, sorts, and (for the licensing persona) fee-partitions the
/// corpus. Steps 1–5 of the module algorithm; no truncation.
pub fn rank_fragments<'a>(
    query: &str,
    corpus: &'a Corpus,
    agent_type: Option<&str>,
) -> Vec<ScoredFragment<'a>> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredFragment<'a>> = corpus
        .iter()
        .enumerate()
        .map(|(index, fragment)| ScoredFragment {
            fragment,
            score: score_content(&terms, &fragment.content),
            index,
        })
        .filter(|s| s.score > 0)
        .collect();

    // `sort_by` is stable: equal scores stay in corpus order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));

    if AgentType::parse(agent_type).persona().prioritize_fees {
        prioritize_fees(scored)
    } else {
        scored
    }
}

/// Partitions on the fragment itself, so duplicate-content fragments at
/// different corpus positions are classified independently.
fn prioritize_fees(scored: Vec<ScoredFragment<'_>>) -> Vec<ScoredFragment<'_>> {
    let (mut fees, others): (Vec<_>, Vec<_>) =
        scored.into_iter().partition(|s| is_fee_fragment(s.fragment));
    fees.extend(others);
    fees
}

/// Renders fragments as `"[topic] content"` blocks separated by a blank line.
pub fn format_context<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a Fragment>,
{
    fragments
        .into_iter()
        .map(|f| format!("[{}] {}", f.topic, f.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Ranks `corpus` against `query` and assembles at most `top_k` fragments
/// into a context block.
///
/// Never fails: an empty query, an empty corpus, or a query with no overlap
/// yields `matched = false` and an empty context.
pub fn rank(query: &str, corpus: &Corpus, top_k: usize, agent_type: Option<&str>) -> Retrieval {
    let ranked = rank_fragments(query, corpus, agent_type);
    if ranked.is_empty() {
        return Retrieval::none();
    }

    let context = format_context(ranked.iter().take(top_k).map(|s| s.fragment));
    Retrieval {
        context,
        matched: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(topic: &str, content: &str, source: &str) -> Fragment {
        Fragment::new(topic, content, 1, source).unwrap()
    }

    fn topics(ranked: &[ScoredFragment<'_>]) -> Vec<String> {
        ranked.iter().map(|s| s.fragment.topic.clone()).collect()
    }

    #[test]
    fn pricing_scenario_matches_on_substring() {
        let corpus = Corpus::from_fragments(vec![frag(
            "Pricing",
            "Starter $999/mo Professional $4999/mo",
            "default",
        )]);
        let r = rank("what is the professional price", &corpus, DEFAULT_TOP_K, None);
        assert!(r.matched);
        assert!(r
            .context
            .contains("[Pricing] Starter $999/mo Professional $4999/mo"));

        // Scoring looks at content only: none of these terms occur in it.
        assert!(!rank("what is the price", &corpus, DEFAULT_TOP_K, None).matched);
    }

    #[test]
    fn no_overlap_yields_empty_unmatched() {
        let corpus = Corpus::from_fragments(vec![
            frag("A", "alpha beta", "a.pdf"),
            frag("B", "gamma delta", "b.pdf"),
        ]);
        let r = rank("zzz qqq", &corpus, 3, None);
        assert_eq!(r, Retrieval::none());
        assert_eq!(r.context, "");
        assert!(!r.matched);
    }

    #[test]
    fn empty_query_or_corpus_is_unmatched() {
        let corpus = Corpus::default_corpus();
        assert!(!rank("", &corpus, 3, None).matched);
        assert!(!rank("   \n\t", &corpus, 3, None).matched);
        assert!(!rank("pricing", &Corpus::default(), 3, None).matched);
    }

    #[test]
    fn substring_semantics_are_permissive() {
        let terms = query_terms("a cat");
        // "a" hits "standard"; "cat" hits "category".
        assert_eq!(score_content(&terms, "Standard Category"), 2);
    }

    #[test]
    fn duplicate_query_terms_count_per_occurrence() {
        let terms = query_terms("fee FEE fee");
        assert_eq!(terms.len(), 3);
        assert_eq!(score_content(&terms, "The annual fee"), 3);
    }

    #[test]
    fn equal_scores_keep_corpus_order() {
        let corpus = Corpus::from_fragments(vec![
            frag("A", "license capital", "a.pdf"),
            frag("B", "capital license", "b.pdf"),
            frag("C", "unrelated", "c.pdf"),
        ]);
        let ranked = rank_fragments("license capital", &corpus, None);
        assert_eq!(topics(&ranked), vec!["A", "B"]);
        assert!(ranked.iter().all(|s| s.score == 2));
    }

    #[test]
    fn higher_scores_sort_first_with_stable_ties() {
        let corpus = Corpus::from_fragments(vec![
            frag("one-a", "license", "a"),
            frag("two", "license capital", "b"),
            frag("one-b", "capital", "c"),
            frag("three", "license capital category", "d"),
        ]);
        let ranked = rank_fragments("license capital category", &corpus, None);
        assert_eq!(topics(&ranked), vec!["three", "two", "one-a", "one-b"]);
        let scores: Vec<usize> = ranked.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![3, 2, 1, 1]);
    }

    #[test]
    fn license_agent_puts_fee_fragments_first() {
        let corpus = Corpus::from_fragments(vec![
            frag("Category 3A", "license capital requirements for category", "licensing.pdf"),
            frag("Overview", "license basics", "guide.pdf"),
            frag("Annual FEES", "license", "module.pdf"),
            frag("Schedule", "capital license table", "DFSA_Fee_Module.pdf"),
        ]);
        let q = "license capital category";

        let plain = rank_fragments(q, &corpus, None);
        assert_eq!(
            topics(&plain),
            vec!["Category 3A", "Schedule", "Overview", "Annual FEES"]
        );

        let fee_first = rank_fragments(q, &corpus, Some("license_recommendation"));
        assert_eq!(
            topics(&fee_first),
            vec!["Schedule", "Annual FEES", "Category 3A", "Overview"]
        );

        let advisor = rank_fragments(q, &corpus, Some("regulatory_advisor"));
        assert_eq!(topics(&advisor), topics(&plain));
    }

    #[test]
    fn fee_partition_classifies_duplicates_by_position() {
        let corpus = Corpus::from_fragments(vec![
            frag("Intro", "same text", "intro.pdf"),
            frag("Fee table", "same text", "fees.pdf"),
            frag("Intro", "same text", "intro.pdf"),
        ]);
        let ranked = rank_fragments("same", &corpus, Some("license_recommendation"));
        let indices: Vec<usize> = ranked.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 0, 2]);
    }

    #[test]
    fn top_k_truncates_and_formats_with_blank_lines() {
        let corpus = Corpus::from_fragments(vec![
            frag("A", "rust one", "a"),
            frag("B", "rust two", "b"),
            frag("C", "rust three", "c"),
        ]);
        let r = rank("rust", &corpus, 2, None);
        assert!(r.matched);
        assert_eq!(r.context, "[A] rust one\n\n[B] rust two");

        let zero = rank("rust", &corpus, 0, None);
        assert!(zero.matched);
        assert_eq!(zero.context, "");
    }
}
