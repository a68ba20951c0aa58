//! Lexical-relevance content filter
//!
//! Scores segments against a query with the BM25 ranking function, treating
//! each segment as a document and the page as the corpus. When no query is
//! supplied, a pseudo-query is derived from the page's title and meta
//! description so the filter degrades gracefully instead of failing.

use crate::config::Bm25Config;
use crate::extract::segment::Segment;
use crate::extract::PageContext;
use std::collections::HashMap;

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// BM25 content filter
#[derive(Debug, Clone)]
pub struct Bm25Filter {
    query: Option<String>,
    threshold: f64,
    use_stemming: bool,
}

impl Bm25Filter {
    pub fn new(config: &Bm25Config) -> Self {
        Self {
            query: config.query.clone(),
            threshold: config.threshold,
            use_stemming: config.use_stemming,
        }
    }

    /// Selects the indices of segments whose BM25 score reaches the threshold
    ///
    /// A page with neither a query nor usable metadata yields an empty
    /// selection.
    pub fn select(&self, segments: &[Segment], context: &PageContext) -> Vec<usize> {
        let query_text = match &self.query {
            Some(q) => q.clone(),
            None => pseudo_query(context),
        };

        let query_terms = self.tokenize(&query_text);
        if query_terms.is_empty() || segments.is_empty() {
            return Vec::new();
        }

        let docs: Vec<Vec<String>> = segments.iter().map(|s| self.tokenize(&s.text)).collect();
        let avg_len =
            docs.iter().map(|d| d.len()).sum::<usize>() as f64 / docs.len() as f64;

        // Document frequency per query term
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for term in &query_terms {
            let df = docs.iter().filter(|d| d.iter().any(|t| t == term)).count();
            doc_freq.insert(term.as_str(), df);
        }

        let n = docs.len() as f64;
        let mut selected = Vec::new();

        for (i, doc) in docs.iter().enumerate() {
            if doc.is_empty() {
                continue;
            }

            let mut score = 0.0;
            for term in &query_terms {
                let tf = doc.iter().filter(|t| *t == term).count() as f64;
                if tf == 0.0 {
                    continue;
                }

                let df = doc_freq[term.as_str()] as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let len_norm = 1.0 - B + B * doc.len() as f64 / avg_len;
                score += idf * tf * (K1 + 1.0) / (tf + K1 * len_norm);
            }

            if score >= self.threshold {
                selected.push(i);
            }
        }

        selected
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| {
                if self.use_stemming {
                    stem(t)
                } else {
                    t.to_string()
                }
            })
            .collect()
    }
}

/// Derives a query from page metadata when none is configured
fn pseudo_query(context: &PageContext) -> String {
    let mut parts = Vec::new();
    if let Some(title) = &context.title {
        parts.push(title.as_str());
    }
    if let Some(description) = &context.description {
        parts.push(description.as_str());
    }
    parts.join(" ")
}

/// Light suffix-stripping stemmer
///
/// Not a full Porter stemmer: strips the common English inflection
/// suffixes, enough to make "configure"/"configuring"/"configured" and
/// "crawler"/"crawlers" collide.
fn stem(word: &str) -> String {
    const SUFFIXES: &[(&str, &str)] = &[
        ("ingly", ""),
        ("edly", ""),
        ("ing", ""),
        ("ied", "y"),
        ("ies", "y"),
        ("ed", ""),
        ("ly", ""),
        ("es", ""),
        ("s", ""),
    ];

    for (suffix, replacement) in SUFFIXES {
        if let Some(base) = word.strip_suffix(suffix) {
            if base.len() >= 3 {
                return format!("{}{}", base, replacement);
            }
        }
    }

    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::segment::SegmentKind;
    use url::Url;

    fn seg(text: &str) -> Segment {
        Segment {
            kind: SegmentKind::Paragraph,
            text: text.to_string(),
            word_count: text.split_whitespace().count(),
            link_word_count: 0,
        }
    }

    fn context(title: Option<&str>, description: Option<&str>) -> PageContext {
        PageContext {
            url: Url::parse("https://example.com/").unwrap(),
            title: title.map(String::from),
            description: description.map(String::from),
        }
    }

    fn filter(query: Option<&str>, threshold: f64, stemming: bool) -> Bm25Filter {
        Bm25Filter::new(&Bm25Config {
            query: query.map(String::from),
            threshold,
            use_stemming: stemming,
        })
    }

    #[test]
    fn test_relevant_segments_score_higher() {
        let segments = vec![
            seg("rust async runtime internals and scheduling"),
            seg("cookie policy and legal boilerplate text"),
            seg("the async scheduler polls rust futures"),
        ];
        let f = filter(Some("rust async"), 0.5, false);

        let selected = f.select(&segments, &context(None, None));
        assert!(selected.contains(&0));
        assert!(selected.contains(&2));
        assert!(!selected.contains(&1));
    }

    #[test]
    fn test_pseudo_query_from_metadata() {
        let segments = vec![
            seg("installation guide for the crawler binary"),
            seg("unrelated marketing copy about synergy"),
        ];
        let f = filter(None, 0.5, false);
        let ctx = context(Some("crawler installation"), Some("guide"));

        let selected = f.select(&segments, &ctx);
        assert_eq!(selected, vec![0]);
    }

    #[test]
    fn test_no_query_no_metadata_selects_nothing() {
        let segments = vec![seg("some text here")];
        let f = filter(None, 0.5, false);

        assert!(f.select(&segments, &context(None, None)).is_empty());
    }

    #[test]
    fn test_threshold_gates_selection() {
        let segments = vec![seg("rust crawler"), seg("rust")];
        let strict = filter(Some("rust crawler"), 100.0, false);

        assert!(strict
            .select(&segments, &context(None, None))
            .is_empty());
    }

    #[test]
    fn test_stemming_collapses_inflections() {
        let segments = vec![seg("crawlers are crawling pages")];

        let without = filter(Some("crawler crawl"), 0.5, false);
        assert!(without.select(&segments, &context(None, None)).is_empty());

        let with = filter(Some("crawler crawl"), 0.5, true);
        assert_eq!(with.select(&segments, &context(None, None)), vec![0]);
    }

    #[test]
    fn test_stem_examples() {
        assert_eq!(stem("crawlers"), "crawler");
        assert_eq!(stem("crawling"), "crawl");
        assert_eq!(stem("studies"), "study");
        assert_eq!(stem("quickly"), "quick");
        // Too short to strip
        assert_eq!(stem("is"), "is");
    }

    #[test]
    fn test_empty_page() {
        let f = filter(Some("anything"), 0.5, false);
        assert!(f.select(&[], &context(None, None)).is_empty());
    }
}
