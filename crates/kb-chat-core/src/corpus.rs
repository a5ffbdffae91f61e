//! The in-memory knowledge-base corpus.
//!
//! A [`Corpus`] is built exactly once at start-up and shared read-only by
//! every request. Insertion order is discovery order and is the tie-break
//! order used by the ranker.

use crate::models::{Fragment, DEFAULT_SOURCE};

/// Ordered, immutable collection of [`Fragment`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    fragments: Vec<Fragment>,
}

impl Corpus {
    pub fn from_fragments(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    /// Uses `fragments` when non-empty, otherwise the built-in default corpus.
    pub fn or_default(fragments: Vec<Fragment>) -> Self {
        if fragments.is_empty() {
            Self::default_corpus()
        } else {
            Self::from_fragments(fragments)
        }
    }

    pub fn default_corpus() -> Self {
        Self::from_fragments(default_fragments())
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fragment> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// True when every fragment came from the built-in defaults.
    pub fn is_default(&self) -> bool {
        !self.fragments.is_empty() && self.fragments.iter().all(Fragment::is_synthetic)
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Fragment;
    type IntoIter = std::slice::Iter<'a, Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.iter()
    }
}

/// The four generic business-description fragments served when no document
/// yields any text.
pub fn default_fragments() -> Vec<Fragment> {
    const DEFAULTS: [(&str, &str); 4] = [
        (
            "Company Overview",
            "We provide a digital platform that helps enterprises register, obtain licenses, \
             and stay compliant with financial services regulation.",
        ),
        (
            "Services",
            "Services include license recommendation, regulatory advisory, application \
             preparation, document management, and ongoing compliance monitoring.",
        ),
        ("Pricing", "Starter $999/mo Professional $4999/mo"),
        (
            "Support",
            "Support is available by email and live chat during business hours, with \
             dedicated account managers on the Professional plan.",
        ),
    ];

    DEFAULTS
        .iter()
        .map(|(topic, content)| Fragment {
            topic: topic.to_string(),
            content: content.to_string(),
            page: 0,
            source: DEFAULT_SOURCE.to_string(),
        })
        .collect()
}
