//! Static set of upstream targets the relay may forward to.
//!
//! Checked after registry resolution and independently of it, so a tampered
//! registry entry still cannot point the relay at an arbitrary host.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    targets: HashSet<String>,
}

impl Allowlist {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            targets: targets
                .into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Exact match on the resolved URL
    pub fn allows(&self, url: &str) -> bool {
        self.targets.contains(url.trim())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        let allowlist = Allowlist::new(["https://api.example.com/data", " http://localhost:3000/echo "]);
        assert_eq!(allowlist.len(), 2);
        assert!(allowlist.allows("https://api.example.com/data"));
        assert!(allowlist.allows("http://localhost:3000/echo"));
        assert!(!allowlist.allows("https://api.example.com/data/"));
        assert!(!allowlist.allows("https://api.example.com/other"));
    }

    #[test]
    fn test_empty_allows_nothing() {
        let allowlist = Allowlist::new(Vec::<String>::new());
        assert!(allowlist.is_empty());
        assert!(!allowlist.allows("https://api.example.com/data"));
    }
}
