//! Deduplicated set of observed categories
//!
//! Owned by the writer thread for the whole run and handed to the driver
//! afterwards, so it is a plain `HashSet` with no synchronization.

use crate::error::Result;
use crate::sink::LineSink;
use crate::types::Category;
use std::collections::HashSet;

/// Membership-only set of categories (no counts)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummarySet {
    categories: HashSet<Category>,
}

impl SummarySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a category; returns true if it was not present
    pub fn insert(&mut self, category: Category) -> bool {
        self.categories.insert(category)
    }

    /// Whether `category` has been seen
    pub fn contains(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    /// Number of distinct categories
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether no category has been seen
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Categories in lexical order
    pub fn sorted(&self) -> Vec<&Category> {
        let mut categories: Vec<_> = self.categories.iter().collect();
        categories.sort();
        categories
    }

    /// Write one category per line; returns the number of lines written
    pub fn persist(&self, sink: &mut LineSink) -> Result<usize> {
        let categories = self.sorted();
        for category in &categories {
            sink.write_line(category.as_str())?;
        }
        Ok(categories.len())
    }
}

impl Extend<Category> for SummarySet {
    fn extend<T: IntoIterator<Item = Category>>(&mut self, iter: T) {
        self.categories.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_deduplicates() {
        let mut set = SummarySet::new();
        assert!(set.insert(Category::normalize(Some("USA"))));
        assert!(!set.insert(Category::normalize(Some("\"USA\""))));
        assert!(set.insert(Category::null()));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Category::null()));
    }

    #[test]
    fn test_persist_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.txt");

        let mut set = SummarySet::new();
        set.extend(["UK", "USA", "UK"].map(|c| Category::normalize(Some(c))));

        let mut sink = LineSink::open(&path, false).unwrap();
        assert_eq!(set.persist(&mut sink).unwrap(), 2);
        sink.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "UK\nUSA\n");
    }

    proptest! {
        #[test]
        fn test_set_matches_distinct_inputs(values in prop::collection::vec("[A-C]{1,2}", 0..60)) {
            let mut set = SummarySet::new();
            set.extend(values.iter().map(|v| Category::normalize(Some(v))));

            let distinct: HashSet<&String> = values.iter().collect();
            prop_assert_eq!(set.len(), distinct.len());
            for v in &values {
                prop_assert!(set.contains(&Category::normalize(Some(v))));
            }
        }
    }
}
