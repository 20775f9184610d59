//! Fuzzy name matching.
//!
//! Similarity is the longest-matching-block ratio: recursively find the
//! longest common run of characters, recurse on both sides, and score
//! `2 * matched / (len(a) + len(b))`. Matching is case-sensitive and works
//! on Unicode scalar values.
//!
//! For a reference string of 200 or more characters, characters occurring in
//! more than 1% of it (plus one) are treated as too common to seed a match,
//! though matches may still extend through them.

use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::category::Category;
use crate::index::{CrosslinkRef, Crosslinks, IndexEntry};

pub const SEARCH_LIMIT: usize = 5;
pub const SEARCH_CUTOFF: f64 = 0.5;
pub const RELATED_LIMIT: usize = 3;
pub const RELATED_CUTOFF: f64 = 0.6;

const AUTOJUNK_MIN_LEN: usize = 200;

/// Precomputed positions of every character of the reference string `b`.
struct Matcher {
    b: Vec<char>,
    b2j: HashMap<char, Vec<usize>>,
}

impl Matcher {
    fn new(b: &str) -> Self {
        let b: Vec<char> = b.chars().collect();
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }
        Self { b, b2j }
    }

    /// `(i, j, size)` of the longest block with `a[i..i+size] == b[j..j+size]`
    /// inside the given bounds. Earliest in `a`, then earliest in `b`, wins.
    fn longest_match(&self, a: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let b = &self.b;
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(c) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = next;
        }

        while besti > alo && bestj > blo && a[besti - 1] == b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi && bestj + bestsize < bhi && a[besti + bestsize] == b[bestj + bestsize] {
            bestsize += 1;
        }
        (besti, bestj, bestsize)
    }

    fn matched_chars(&self, a: &[char]) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(a, alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    fn ratio(&self, a: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let total = a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * self.matched_chars(&a) as f64 / total as f64
    }
}

/// Similarity of `a` against reference `b`, in `[0, 1]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    Matcher::new(b).ratio(a)
}

/// Up to `limit` candidates scoring at least `cutoff` against `word`, best
/// first. Equal scores order by candidate, descending.
pub fn close_matches<'a>(
    word: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    limit: usize,
    cutoff: f64,
) -> Vec<&'a str> {
    let matcher = Matcher::new(word);
    let mut scored: Vec<(f64, &str)> = candidates
        .into_iter()
        .map(|candidate| (matcher.ratio(candidate), candidate))
        .filter(|(score, _)| *score >= cutoff)
        .collect();
    scored.sort_by(|x, y| {
        y.0.partial_cmp(&x.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| y.1.cmp(x.1))
    });
    scored.truncate(limit);
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Near matches of `term` against entity names, per category.
///
/// Categories are visited in [`Category::ALL`] order and their results
/// concatenated without global re-ranking. Within a category, entries
/// appear in similarity order; every entry carrying a matched name is
/// returned.
pub fn search(term: &str, indexes: &IndexMap<Category, Vec<IndexEntry>>) -> Vec<IndexEntry> {
    let mut results = Vec::new();
    for category in Category::ALL {
        let Some(entries) = indexes.get(&category) else {
            continue;
        };
        let mut seen = HashSet::new();
        let names: Vec<&str> = entries
            .iter()
            .map(|e| e.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect();
        for name in close_matches(term, names, SEARCH_LIMIT, SEARCH_CUTOFF) {
            results.extend(entries.iter().filter(|e| e.name == name).cloned());
        }
    }
    results
}

/// Outcome of a crosslink lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Related {
    Found {
        name: String,
        links: Vec<CrosslinkRef>,
    },
    NoExactMatch {
        query: String,
        suggestions: Vec<String>,
    },
}

/// Exact crosslink hit, or up to [`RELATED_LIMIT`] suggestions.
pub fn resolve_related(name: &str, crosslinks: &Crosslinks) -> Related {
    if let Some(links) = crosslinks.get(name) {
        return Related::Found {
            name: name.to_string(),
            links: links.clone(),
        };
    }
    let suggestions = close_matches(
        name,
        crosslinks.keys().map(String::as_str),
        RELATED_LIMIT,
        RELATED_CUTOFF,
    );
    Related::NoExactMatch {
        query: name.to_string(),
        suggestions: suggestions.into_iter().map(str::to_string).collect(),
    }
}
