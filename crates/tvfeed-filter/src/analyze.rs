//! Episode and release-year extraction from free-form programme text.
//!
//! Both extractors try an ordered list of patterns and take the first that
//! matches. Text that matches nothing yields empty results, never an error.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tvfeed_core::EpisodeInfo;

/// Episode patterns, most specific first. `s` is the series number, `e` the
/// episode number. Every pattern is bounded by start/end of text or a
/// non-word character on both sides.
static EPISODE_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        // "S2 E05", "s1/ep3", "S3, E1", "Ep 4", "E12"
        Regex::new(r"(?i)(^|\W)(s ?(?P<s>[0-9]+)( |/|, )?)?ep? ?(?P<e>[0-9]+)($|\W)")
            .expect("valid series/episode regex"),
        // "3/10"
        Regex::new(r"(^|\W)(?P<s>[0-9]+)/(?P<e>[0-9]+)($|\W)").expect("valid slash regex"),
        // "2 of 6"
        Regex::new(r"(?i)(^|\W)(?P<s>[0-9]+) of (?P<e>[0-9]+)($|\W)")
            .expect("valid 'of' regex"),
        // "Episode 4"
        Regex::new(r"(?i)(^|\W)episode (?P<e>[0-9]+)($|\W)").expect("valid episode regex"),
    ]
});

/// Release-year patterns, most specific first.
static YEAR_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\((?P<y>[0-9]{4})\)").expect("valid parenthesised year regex"),
        Regex::new(r"\[(?P<y>[0-9]{4})\]").expect("valid bracketed year regex"),
        // "Drama. 1994. Starring ..." or "1994." at the very start
        Regex::new(r"(^|[.,)] +)(?P<y>[0-9]{4})\.").expect("valid sentence year regex"),
    ]
});

/// Series and episode numbers mentioned in `text`.
///
/// A pattern whose numbers do not fit in a `u32` is treated as not matching
/// and the next pattern is tried.
#[must_use]
pub fn extract_episode_info(text: &str) -> EpisodeInfo {
    for pattern in EPISODE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let Some(Ok(episode)) = number(&caps, "e") else {
            continue;
        };
        let series = match number(&caps, "s") {
            Some(Ok(series)) => Some(series),
            Some(Err(_)) => continue,
            None => None,
        };
        return EpisodeInfo {
            series,
            episode: Some(episode),
        };
    }
    EpisodeInfo::default()
}

/// Release year mentioned in `text`, if any.
#[must_use]
pub fn extract_created_year(text: &str) -> Option<i32> {
    YEAR_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| number::<i32>(&caps, "y"))
            .and_then(Result::ok)
    })
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: &str) -> Option<Result<T, T::Err>> {
    caps.name(group).map(|m| m.as_str().parse())
}

#[cfg(test)]
#[path = "analyze_test.rs"]
mod tests;
