//! Target function set
//!
//! The set is built once per run from the comma-separated `--functions`
//! value and is read-only afterwards. Items are taken verbatim: no
//! whitespace trimming, and a trailing comma contributes an empty-string
//! member. Matching is exact and case-sensitive.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    names: BTreeSet<String>,
}

impl TargetSet {
    /// Split `list` on `,` and keep every item as-is
    ///
    /// ```
    /// use cp_inserter_core::targets::TargetSet;
    ///
    /// let set = TargetSet::parse("f1,f2,");
    /// assert!(set.contains("f1"));
    /// assert!(set.contains(""));
    /// ```
    pub fn parse(list: &str) -> Self {
        TargetSet {
            names: list.split(',').map(str::to_string).collect(),
        }
    }

    /// Build from already separated names (configuration file form)
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TargetSet {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether a function with this (possibly absent) name is a target.
    /// Unnamed functions never are, even when `""` is a member.
    pub fn matches(&self, name: Option<&str>) -> bool {
        name.is_some_and(|n| self.contains(n))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Members in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
