use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One purchase line after its identifier and category have been stringified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub user_id: String,
    pub category: String,
}

/// Lookup from user id to purchase category.
///
/// Built once by the purchase index builder and read-only afterwards. Inserting
/// an identifier that is already present replaces its category, so the last
/// record for a user wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseIndex {
    categories: HashMap<String, String>,
}

impl PurchaseIndex {
    pub(crate) fn insert(&mut self, record: PurchaseRecord) {
        self.categories.insert(record.user_id, record.category);
    }

    pub fn get(&self, user_id: &str) -> Option<&str> {
        self.categories.get(user_id).map(String::as_str)
    }

    /// Category for `user_id` when one exists and is non-empty
    pub fn matched_category(&self, user_id: &str) -> Option<&str> {
        self.get(user_id).filter(|category| !category.is_empty())
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.categories.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for PurchaseIndex
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut index = PurchaseIndex::default();
        for (user_id, category) in iter {
            index.insert(PurchaseRecord {
                user_id: user_id.into(),
                category: category.into(),
            });
        }
        index
    }
}

/// A visit row with its identifier and source already trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    pub user_id: String,
    pub source: String,
}

/// A visit enriched with the category of the matching purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelRecord {
    pub user_id: String,
    pub source: String,
    pub category: String,
}

impl FunnelRecord {
    pub fn from_visit(visit: VisitRecord, category: &str) -> Self {
        Self {
            user_id: visit.user_id,
            source: visit.source,
            category: category.to_string(),
        }
    }
}

impl fmt::Display for FunnelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.user_id, self.source, self.category)
    }
}
