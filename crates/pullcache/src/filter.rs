use regex::Regex;

/// Allow-list of origin URL patterns.
///
/// An empty set lets every URL through.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    regs: Vec<Regex>,
}

impl Filters {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regs = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { regs })
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Returns true if any pattern matches `url`.
    pub fn matches(&self, url: &str) -> bool {
        self.regs.iter().any(|r| r.is_match(url))
    }

    /// Returns true if `url` may trigger an origin pull.
    pub fn allows(&self, url: &str) -> bool {
        self.is_empty() || self.matches(url)
    }
}
