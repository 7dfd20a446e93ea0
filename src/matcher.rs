use std::cmp::Ordering;

use fuzzy_matcher::FuzzyMatcher;
use tracing::trace;

use crate::history::HistoryEntry;

/// Largest start/span value that still orders correctly; longer offsets clamp.
const POSITION_LIMIT: i64 = (1 << 24) - 1;
/// Dominates any combination of the position components.
const EXACT_BONUS: i64 = 1 << 50;

/// Contiguous run of matched characters (char offsets into `raw_text`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index into the entry slice the result was ranked from.
    pub entry: usize,
    pub score: i64,
    pub match_spans: Vec<MatchSpan>,
}

/// Case-insensitive subsequence matcher with positional scoring.
///
/// Scores are lexicographic: an exact contiguous match beats any scattered
/// one, then an earlier start wins, then a smaller total span. Recency is
/// left to the caller as the final tie-break.
#[derive(Debug, Default, Clone, Copy)]
pub struct HistoryMatcher;

impl FuzzyMatcher for HistoryMatcher {
    fn fuzzy_indices(&self, choice: &str, pattern: &str) -> Option<(i64, Vec<usize>)> {
        let placement = locate(&fold(choice), &fold(pattern))?;
        Some((placement.score(), placement.positions))
    }

    fn fuzzy_match(&self, choice: &str, pattern: &str) -> Option<i64> {
        self.fuzzy_indices(choice, pattern).map(|(score, _)| score)
    }
}

struct Placement {
    exact: bool,
    positions: Vec<usize>,
}

impl Placement {
    fn score(&self) -> i64 {
        let (Some(&first), Some(&last)) = (self.positions.first(), self.positions.last()) else {
            return 0;
        };
        let start = (first as i64).min(POSITION_LIMIT);
        let span = ((last - first + 1) as i64).min(POSITION_LIMIT);
        let exact = if self.exact { EXACT_BONUS } else { 0 };
        exact + ((POSITION_LIMIT - start) << 24) + (POSITION_LIMIT - span)
    }
}

/// Lowercases char by char so char offsets line up with the unfolded text.
fn fold(text: &str) -> String {
    text.chars()
        .map(|ch| ch.to_lowercase().next().unwrap_or(ch))
        .collect()
}

/// Finds the best placement of `query` inside `text`; both already folded.
fn locate(text: &str, query: &str) -> Option<Placement> {
    if query.is_empty() {
        return Some(Placement {
            exact: false,
            positions: Vec::new(),
        });
    }

    if let Some(byte_start) = text.find(query) {
        let start = text[..byte_start].chars().count();
        let len = query.chars().count();
        return Some(Placement {
            exact: true,
            positions: (start..start + len).collect(),
        });
    }

    // The earliest feasible start is always the first occurrence of the
    // query's first char; greedy forward matching then gives the smallest
    // span for that start.
    let mut wanted = query.chars();
    let mut next = wanted.next();
    let mut positions = Vec::with_capacity(query.len());
    for (index, ch) in text.chars().enumerate() {
        let Some(target) = next else {
            break;
        };
        if ch == target {
            positions.push(index);
            next = wanted.next();
        }
    }

    if next.is_some() {
        return None;
    }
    Some(Placement {
        exact: false,
        positions,
    })
}

fn spans_from_positions(positions: &[usize]) -> Vec<MatchSpan> {
    let mut spans: Vec<MatchSpan> = Vec::new();
    for &position in positions {
        match spans.last_mut() {
            Some(span) if span.start + span.len == position => span.len += 1,
            _ => spans.push(MatchSpan {
                start: position,
                len: 1,
            }),
        }
    }
    spans
}

fn rank_candidates<M, I>(
    matcher: &M,
    entries: &[HistoryEntry],
    candidates: I,
    query: &str,
) -> Vec<MatchResult>
where
    M: FuzzyMatcher,
    I: IntoIterator<Item = usize>,
{
    let mut results: Vec<MatchResult> = candidates
        .into_iter()
        .filter_map(|index| {
            let (score, positions) = matcher.fuzzy_indices(&entries[index].raw_text, query)?;
            Some(MatchResult {
                entry: index,
                score,
                match_spans: spans_from_positions(&positions),
            })
        })
        .collect();

    results.sort_by(|a, b| match b.score.cmp(&a.score) {
        Ordering::Equal => entries[b.entry]
            .sequence_index
            .cmp(&entries[a.entry].sequence_index),
        other => other,
    });
    results
}

/// Ranks every entry against `query`. Pure: the same inputs always give the
/// same output, including scores and spans.
pub fn rank(entries: &[HistoryEntry], query: &str) -> Vec<MatchResult> {
    rank_candidates(&HistoryMatcher, entries, 0..entries.len(), query)
}

/// Same results as [`rank`], but remembers which entries matched the
/// previous query. When the new query extends it only those are rescanned,
/// since a subsequence match of the longer query is always a match of its
/// prefix.
#[derive(Debug, Clone, Default)]
pub struct IncrementalRanker {
    previous: Option<(String, Vec<usize>)>,
}

impl IncrementalRanker {
    pub fn rank(&mut self, entries: &[HistoryEntry], query: &str) -> Vec<MatchResult> {
        let folded_query = fold(query);

        let results = match self.previous.take() {
            Some((previous_query, candidates)) if folded_query.starts_with(&previous_query) => {
                trace!(candidates = candidates.len(), "narrowing previous matches");
                rank_candidates(&HistoryMatcher, entries, candidates, query)
            }
            _ => rank(entries, query),
        };

        let matched = results.iter().map(|result| result.entry).collect();
        self.previous = Some((folded_query, matched));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;

    fn ranked_texts<'a>(store: &'a HistoryStore, query: &str) -> Vec<&'a str> {
        rank(store.entries(), query)
            .into_iter()
            .map(|result| store.entries()[result.entry].raw_text.as_str())
            .collect()
    }

    fn is_subsequence(text: &str, query: &str) -> bool {
        let mut wanted = query.chars().flat_map(char::to_lowercase).peekable();
        for ch in text.chars().flat_map(char::to_lowercase) {
            if wanted.peek() == Some(&ch) {
                wanted.next();
            }
        }
        wanted.peek().is_none()
    }

    fn sample_store() -> HistoryStore {
        HistoryStore::from_commands([
            "git status",
            "git commit -m fix",
            "ls -la",
            "cargo build --release",
            "cargo test -- --nocapture",
            "echo 'Hello World'",
            "grep -rn TODO src/",
            "docker compose up -d",
            "git checkout -b feature/search",
            "ssh deploy@example.com",
        ])
    }

    #[test]
    fn only_git_commit_matches_gc() {
        let store = HistoryStore::from_commands(["git status", "git commit -m fix", "ls -la"]);
        assert_eq!(ranked_texts(&store, "gc"), vec!["git commit -m fix"]);
    }

    #[test]
    fn empty_query_lists_everything_most_recent_first() {
        let store = HistoryStore::from_commands(["a", "b", "a", "c"]);
        assert_eq!(ranked_texts(&store, ""), vec!["c", "a", "b"]);
        let results = rank(store.entries(), "");
        assert!(results.iter().all(|result| result.match_spans.is_empty()));
    }

    #[test]
    fn every_result_contains_query_as_subsequence() {
        let store = sample_store();
        for query in ["g", "gc", "GIT", "cb", "-d", "xyz", "s/", "te", "o w"] {
            let results = rank(store.entries(), query);
            for entry in store.entries() {
                let listed = results
                    .iter()
                    .any(|result| store.entries()[result.entry].raw_text == entry.raw_text);
                assert_eq!(
                    listed,
                    is_subsequence(&entry.raw_text, query),
                    "query {query:?} entry {:?}",
                    entry.raw_text
                );
            }
        }
    }

    #[test]
    fn exact_substring_beats_scattered_match() {
        let store = HistoryStore::from_commands(["make", "m-a-k-e"]);
        assert_eq!(ranked_texts(&store, "make"), vec!["make", "m-a-k-e"]);
    }

    #[test]
    fn earlier_match_beats_later_match() {
        let store = HistoryStore::from_commands(["make install", "echo make"]);
        assert_eq!(ranked_texts(&store, "make"), vec!["make install", "echo make"]);
    }

    #[test]
    fn tighter_match_beats_looser_match() {
        let store = HistoryStore::from_commands(["a_b", "a___b"]);
        assert_eq!(ranked_texts(&store, "ab"), vec!["a_b", "a___b"]);
    }

    #[test]
    fn recency_breaks_remaining_ties() {
        let store = HistoryStore::from_commands(["cat a.txt", "cat b.txt"]);
        assert_eq!(ranked_texts(&store, "cat"), vec!["cat b.txt", "cat a.txt"]);
    }

    #[test]
    fn match_is_case_insensitive() {
        let store = HistoryStore::from_commands(["Git Status", "ÄRGER"]);
        assert_eq!(ranked_texts(&store, "gIT"), vec!["Git Status"]);
        assert_eq!(ranked_texts(&store, "är"), vec!["ÄRGER"]);
    }

    #[test]
    fn spans_cover_chosen_characters() {
        let store = HistoryStore::from_commands(["git commit -m fix"]);
        let results = rank(store.entries(), "gc");
        assert_eq!(
            results[0].match_spans,
            vec![MatchSpan { start: 0, len: 1 }, MatchSpan { start: 4, len: 1 }]
        );

        let store = HistoryStore::from_commands(["git status"]);
        let results = rank(store.entries(), "tat");
        assert_eq!(results[0].match_spans, vec![MatchSpan { start: 5, len: 3 }]);
    }

    #[test]
    fn spans_use_char_offsets() {
        let store = HistoryStore::from_commands(["écho ok"]);
        let results = rank(store.entries(), "ok");
        assert_eq!(results[0].match_spans, vec![MatchSpan { start: 5, len: 2 }]);
    }

    #[test]
    fn no_match_gives_empty_list() {
        let store = sample_store();
        assert!(rank(store.entries(), "zzz").is_empty());
        assert!(rank(store.entries(), "git status and then some").is_empty());
    }

    #[test]
    fn ranking_is_idempotent() {
        let store = sample_store();
        for query in ["", "g", "git", "cr", "e"] {
            assert_eq!(rank(store.entries(), query), rank(store.entries(), query));
        }
    }

    #[test]
    fn incremental_ranker_matches_full_rescan() {
        let store = sample_store();
        let mut ranker = IncrementalRanker::default();
        let queries = [
            "", "g", "gi", "git", "git ", "git c", "git", "gi", "c", "ca", "car", "", "D", "do",
            "dock", "doc", "x", "xy", "",
        ];
        for query in queries {
            assert_eq!(
                ranker.rank(store.entries(), query),
                rank(store.entries(), query),
                "query {query:?}"
            );
        }
    }

    #[test]
    fn implements_fuzzy_matcher_trait() {
        let matcher = HistoryMatcher;
        let (score, indices) = matcher.fuzzy_indices("git commit", "GC").unwrap();
        assert_eq!(indices, vec![0, 4]);
        assert_eq!(matcher.fuzzy_match("git commit", "gc"), Some(score));
        assert_eq!(matcher.fuzzy_match("git status", "gc"), None);
        assert!(
            matcher.fuzzy_match("git commit", "commit").unwrap()
                > matcher.fuzzy_match("git commit", "gcmt").unwrap()
        );
    }
}
