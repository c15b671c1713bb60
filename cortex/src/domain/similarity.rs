// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Similarity Deduplication
//!
//! Fuzzy matching of candidate patterns against the cache before insertion,
//! so repeated discoveries of the same idea do not multiply the graph.
//!
//! The ratio is the Ratcliff/Obershelp measure `2 * M / T`, where `M` is the
//! number of characters in the matching blocks found by recursively taking
//! the longest common substring, and `T` is the combined length. Two empty
//! strings score 1.0.
//!
//! Matching is first-match-wins in the iteration order of the candidates.
//! The store iterates in insertion order, which makes results deterministic.

use std::collections::HashMap;

use super::pattern::Pattern;

/// Ratcliff/Obershelp similarity of two strings, in `[0, 1]`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_from_matches(matching_characters(&a, &b), a.len() + b.len())
}

fn ratio_from_matches(matches: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    2.0 * matches as f64 / total as f64
}

/// Upper bound from lengths alone.
fn real_quick_ratio(a: &[char], b: &[char]) -> f64 {
    ratio_from_matches(a.len().min(b.len()), a.len() + b.len())
}

/// Upper bound from the character multiset intersection.
fn quick_ratio(a: &[char], b: &[char]) -> f64 {
    let mut available: HashMap<char, usize> = HashMap::new();
    for &ch in b {
        *available.entry(ch).or_insert(0) += 1;
    }
    let mut matches = 0;
    for ch in a {
        if let Some(count) = available.get_mut(ch) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }
    ratio_from_matches(matches, a.len() + b.len())
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
///
/// Ties resolve to the smallest `i`, then the smallest `j`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                let len = prev[col - 1] + 1;
                curr[col] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            } else {
                curr[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

/// Total size of all matching blocks.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut ranges = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = ranges.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            ranges.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            ranges.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Finds an already-known pattern that a candidate duplicates.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityDeduplicator {
    threshold: f64,
}

impl SimilarityDeduplicator {
    pub const DEFAULT_THRESHOLD: f64 = 0.8;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// True when the similarity ratio of `a` and `b` is strictly above the threshold.
    pub fn exceeds(&self, a: &str, b: &str) -> bool {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if real_quick_ratio(&a, &b) <= self.threshold || quick_ratio(&a, &b) <= self.threshold {
            return false;
        }
        ratio_from_matches(matching_characters(&a, &b), a.len() + b.len()) > self.threshold
    }

    /// Name match or template match, each only when both sides are non-empty.
    ///
    /// Empty strings carry no signal (indexed findings all have an empty
    /// template), so they never match anything.
    pub fn is_duplicate(&self, name: &str, template: &str, candidate: &Pattern) -> bool {
        let similar = |a: &str, b: &str| !a.is_empty() && !b.is_empty() && self.exceeds(a, b);
        similar(name, &candidate.name) || similar(template, &candidate.template)
    }

    /// First candidate that `(name, template)` duplicates.
    pub fn find_similar<'a, I>(&self, candidates: I, name: &str, template: &str) -> Option<&'a Pattern>
    where
        I: IntoIterator<Item = &'a Pattern>,
    {
        candidates
            .into_iter()
            .find(|candidate| self.is_duplicate(name, template, candidate))
    }
}

impl Default for SimilarityDeduplicator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}
