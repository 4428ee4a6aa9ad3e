//! Keyword-window snippet extraction.
//!
//! Full paper texts are far too large to hand to the generation model, so
//! each resolved document is reduced to one bounded excerpt. The heuristic:
//! for every long-enough query keyword, take a window around its first
//! occurrence and keep the window in which the most keywords co-occur. This
//! approximates "the passage most likely to contain the answer" without a
//! re-ranking model.
//!
//! All offsets and lengths are in characters, not bytes, so the bound holds
//! for arbitrary UTF-8.

/// Maximum snippet length in characters.
pub const SNIPPET_MAX_LEN: usize = 2000;

/// Minimum keyword length; shorter query tokens are noise words.
const MIN_KEYWORD_LEN: usize = 3;

/// Select a snippet of at most `max_len` characters from `content`.
///
/// Falls back to the leading `max_len` characters when the query has no
/// usable keywords or no keyword window scores above zero. A keyword match
/// at position 0 is deliberately ignored: the leading window and the default
/// prefix coincide there, and the original pipeline treated that position as
/// "no match".
pub fn extract_snippet(content: &str, query: &str, max_len: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    let default_snippet: String = chars.iter().take(max_len).collect();

    let keywords: Vec<Vec<char>> = query
        .split_whitespace()
        .filter(|token| token.chars().count() > MIN_KEYWORD_LEN)
        .map(lowercase_chars)
        .collect();

    if keywords.is_empty() {
        return default_snippet;
    }

    // Per-char lowercase keeps a 1:1 alignment between the lowered text used
    // for matching and the original text used for the returned excerpt.
    let lowered: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    // Window geometry: a quarter of the budget before the match, the rest
    // after, so the nominal window width equals `max_len`.
    let before = max_len / 4;
    let after = max_len - before;

    let mut best_score = 0usize;
    let mut best_snippet: Option<String> = None;

    for keyword in &keywords {
        let Some(pos) = find_subsequence(&lowered, keyword) else {
            continue;
        };
        if pos == 0 {
            continue;
        }

        let start = pos.saturating_sub(before);
        let end = (pos + after).min(chars.len());
        let window = &lowered[start..end];

        let score = keywords
            .iter()
            .filter(|k| contains_subsequence(window, k))
            .count();

        // Strict comparison: the first keyword (in query order) to reach the
        // best score keeps its window.
        if score > best_score {
            best_score = score;
            best_snippet = Some(chars[start..end].iter().collect());
        }
    }

    best_snippet.unwrap_or(default_snippet)
}

fn lowercase_chars(token: &str) -> Vec<char> {
    token
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

fn find_subsequence(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains_subsequence(haystack: &[char], needle: &[char]) -> bool {
    find_subsequence(haystack, needle).is_some()
}
