//! Pruning content filter
//!
//! Scores each segment by a structural density heuristic and drops segments
//! below a cutoff. The cutoff is either the configured threshold itself
//! (fixed) or the threshold scaled by the page's own mean score (dynamic),
//! so dynamic mode adapts to pages that are uniformly sparse or dense.

use crate::config::{PruningConfig, ThresholdKind};
use crate::extract::segment::{Segment, SegmentKind};

/// Heuristic pruning filter
#[derive(Debug, Clone)]
pub struct PruningFilter {
    threshold: f64,
    threshold_type: ThresholdKind,
    min_word_threshold: usize,
}

impl PruningFilter {
    pub fn new(config: &PruningConfig) -> Self {
        Self {
            threshold: config.threshold,
            threshold_type: config.threshold_type,
            min_word_threshold: config.min_word_threshold,
        }
    }

    /// Selects the indices of segments to retain
    ///
    /// Segments shorter than the minimum word count are dropped before
    /// scoring and do not participate in the dynamic mean.
    pub fn select(&self, segments: &[Segment]) -> Vec<usize> {
        let scored: Vec<(usize, f64)> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.word_count >= self.min_word_threshold)
            .map(|(i, s)| (i, score_segment(s)))
            .collect();

        if scored.is_empty() {
            return Vec::new();
        }

        let cutoff = match self.threshold_type {
            ThresholdKind::Fixed => self.threshold,
            ThresholdKind::Dynamic => {
                let mean: f64 =
                    scored.iter().map(|(_, s)| s).sum::<f64>() / scored.len() as f64;
                self.threshold * mean
            }
        };

        scored
            .into_iter()
            .filter(|(_, score)| *score >= cutoff)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Density score in [0, 1]: tag weight discounted by link density
///
/// Navigation-style blocks are mostly links and score near zero; prose
/// paragraphs score near their full tag weight.
fn score_segment(segment: &Segment) -> f64 {
    let tag_weight = match segment.kind {
        SegmentKind::Paragraph => 1.0,
        SegmentKind::Heading(_) => 0.9,
        SegmentKind::CodeBlock => 0.9,
        SegmentKind::Quote => 0.8,
        SegmentKind::ListItem => 0.6,
    };

    tag_weight * (1.0 - segment.link_density())
}
