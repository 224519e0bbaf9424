//! Detection of site furniture inside article containers: subscription
//! pleas, copyright lines, comment prompts and legal-notice headers.

use regex::RegexSet;

use crate::error::Result;

/// Case-insensitive pattern list, matched as a single set.
#[derive(Debug, Clone)]
pub struct BoilerplateClassifier {
    patterns: Vec<String>,
    set: RegexSet,
}

impl BoilerplateClassifier {
    /// Compile a classifier from a list of regular expressions.
    ///
    /// Each pattern is made case-insensitive before compilation.
    ///
    /// # Arguments
    ///
    /// * `patterns` - Regular expressions, usually from the config's `boilerplate` list
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FeedError::Pattern`] when any pattern fails to compile.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let set = RegexSet::new(patterns.iter().map(|p| format!("(?i){p}")))?;
        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    /// The patterns as configured, in order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// A new classifier with `pattern` appended.
    #[cfg(test)]
    pub fn with_pattern(&self, pattern: &str) -> Result<Self> {
        let mut patterns = self.patterns.clone();
        patterns.push(pattern.to_string());
        Self::new(&patterns)
    }

    /// True when any pattern matches anywhere in `text`.
    pub fn is_boilerplate(&self, text: &str) -> bool {
        self.set.is_match(text)
    }
}
