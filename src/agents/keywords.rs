//! 整词关键词匹配
//!
//! 关键词两侧要求单词边界，允许 s / y / ing 词尾："rain" 匹配 "rainy"、"raining"，
//! 但不匹配 "Ukraine"；"hot" 不匹配 "hotel"。

use regex::Regex;

pub struct KeywordSet {
    re: Option<Regex>,
}

impl KeywordSet {
    pub fn new(words: &[&str]) -> Self {
        let alternation = words
            .iter()
            .map(|w| regex::escape(&w.to_lowercase()))
            .collect::<Vec<_>>()
            .join("|");
        let re = if words.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b(?:{})(?:s|y|ing)?\b", alternation)).ok()
        };
        Self { re }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.re.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_words_only() {
        let set = KeywordSet::new(&["rain", "hot", "wind"]);
        assert!(set.matches("will it rain tomorrow"));
        assert!(set.matches("Is it RAINING in Paris?"));
        assert!(set.matches("a windy day"));
        assert!(set.matches("hot, humid"));
        assert!(!set.matches("population of Ukraine"));
        assert!(!set.matches("best hotel in Rome"));
        assert!(!set.matches("Windhoek landmarks"));
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        assert!(!KeywordSet::new(&[]).matches("anything"));
    }

    #[test]
    fn test_keywords_are_escaped() {
        let set = KeywordSet::new(&["c++"]);
        assert!(!set.matches("ccc"));
    }
}
