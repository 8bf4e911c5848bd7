//! Name similarity scoring on a 0–100 scale.

use std::collections::BTreeSet;

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn percent(score: f64) -> u8 {
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Edit-distance similarity of two whole strings.
pub fn ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    percent(strsim::normalized_levenshtein(&a, &b))
}

/// Best ratio of the shorter string against any equal-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (normalize(a), normalize(b));
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    let short_len = short.chars().count();
    if short_len == 0 {
        return if long.is_empty() { 100 } else { 0 };
    }

    let long_chars: Vec<char> = long.chars().collect();
    long_chars
        .windows(short_len)
        .map(|w| {
            let window: String = w.iter().collect();
            percent(strsim::normalized_levenshtein(&short, &window))
        })
        .max()
        .unwrap_or(0)
}

/// Ratio after sorting whitespace-separated tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Ratio over the shared token set plus each side's remainder.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let ta = token_set(a);
    let tb = token_set(b);

    let shared: Vec<&str> = ta.intersection(&tb).map(String::as_str).collect();
    let only_a: Vec<&str> = ta.difference(&tb).map(String::as_str).collect();
    let only_b: Vec<&str> = tb.difference(&ta).map(String::as_str).collect();

    let shared = shared.join(" ");
    let with_a = join_nonempty(&shared, &only_a.join(" "));
    let with_b = join_nonempty(&shared, &only_b.join(" "));

    if shared.is_empty() {
        return ratio(&with_a, &with_b);
    }

    ratio(&shared, &with_a)
        .max(ratio(&shared, &with_b))
        .max(ratio(&with_a, &with_b))
}

/// Highest score across all strategies.
pub fn best_match(a: &str, b: &str) -> u8 {
    ratio(a, b)
        .max(partial_ratio(a, b))
        .max(token_sort_ratio(a, b))
        .max(token_set_ratio(a, b))
}

fn token_set(s: &str) -> BTreeSet<String> {
    normalize(s).split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// Tokens sorted with duplicates kept.
fn sorted_tokens(s: &str) -> String {
    let normalized = normalize(s);
    let mut tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{} {}", a, b),
    }
}
