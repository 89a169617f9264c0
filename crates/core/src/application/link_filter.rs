// LinkFilter (spec §4.6 step 7): applies include/exclude regex patterns to
// a discovered link before it's enqueued as a child crawl. Grounded via the
// `regex` crate choice in adamtc007-ob-poc's Cargo.toml (the teacher itself
// carries no regex dependency).

use regex::Regex;

pub struct LinkFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl LinkFilter {
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self, regex::Error> {
        let include = include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude = exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { include, exclude })
    }

    pub fn empty() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Exclude always rejects. Include matches only if at least one
    /// include pattern was provided and it matches; with no include
    /// patterns, everything not excluded passes.
    pub fn allows(&self, url: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(url)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|re| re.is_match(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_patterns_allows_everything() {
        let f = LinkFilter::empty();
        assert!(f.allows("http://a/x"));
    }

    #[test]
    fn exclude_always_rejects() {
        let f = LinkFilter::new(&["http://a/.*".into()], &["http://a/private".into()]).unwrap();
        assert!(f.allows("http://a/public"));
        assert!(!f.allows("http://a/private"));
    }

    #[test]
    fn include_requires_a_match() {
        let f = LinkFilter::new(&[r"http://a/docs/.*".into()], &[]).unwrap();
        assert!(f.allows("http://a/docs/x"));
        assert!(!f.allows("http://a/other"));
    }
}
