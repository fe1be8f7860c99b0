use std::fmt;

use tvfeed_core::TitleType;

const SEPARATOR: char = '|';

/// Composite ratings index key: `title|type|year`, year empty when unknown.
///
/// The title is lowercased and every part has the separator stripped first,
/// so no title can forge another title's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey(String);

impl IndexKey {
    #[must_use]
    pub fn new(title: &str, title_type: TitleType, year: Option<i32>) -> Self {
        let title = strip_separator(&title.to_lowercase());
        let year = year.map(|y| y.to_string()).unwrap_or_default();
        IndexKey(format!("{title}|{}|{year}", title_type.key_tag()))
    }

    /// Keys to consult for a title, most specific first: the exact-year key
    /// when `year` is known, then the year-less key.
    #[must_use]
    pub fn candidates(title: &str, title_type: TitleType, year: Option<i32>) -> Vec<Self> {
        let mut keys = Vec::with_capacity(2);
        if year.is_some() {
            keys.push(IndexKey::new(title, title_type, year));
        }
        keys.push(IndexKey::new(title, title_type, None));
        keys
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_separator(part: &str) -> String {
    part.chars().filter(|&c| c != SEPARATOR).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lowercases_title_and_formats_year() {
        let key = IndexKey::new("Alien", TitleType::Film, Some(1979));
        assert_eq!(key.as_str(), "alien|movie|1979");
    }

    #[test]
    fn yearless_key_has_empty_last_part() {
        let key = IndexKey::new("The X-Files", TitleType::Series, None);
        assert_eq!(key.as_str(), "the x-files|tvseries|");
    }

    #[test]
    fn separator_inside_title_is_stripped() {
        let forged = IndexKey::new("Alien|movie", TitleType::Film, None);
        assert_eq!(forged.as_str(), "alienmovie|movie|");
        assert_ne!(forged, IndexKey::new("Alien", TitleType::Film, None));
    }

    #[test]
    fn candidates_put_exact_year_first() {
        let keys = IndexKey::candidates("Alien", TitleType::Film, Some(1979));
        let keys: Vec<&str> = keys.iter().map(IndexKey::as_str).collect();
        assert_eq!(keys, ["alien|movie|1979", "alien|movie|"]);
    }

    #[test]
    fn candidates_without_year_is_single_key() {
        let keys = IndexKey::candidates("Alien", TitleType::Film, None);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].as_str(), "alien|movie|");
    }
}
