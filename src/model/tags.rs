//! Tag sets — the key/value label sets that identify services and traffic
//! subsets throughout the mesh model.
//!
//! Backed by `BTreeMap` so that every iteration is already in sorted key
//! order: tag sets feed emitted resource names and orderings, and the
//! incremental delivery protocol downstream diffs successive resource sets,
//! so nondeterministic iteration would manufacture churn on every pass.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{MATCH_ALL, SERVICE_TAG};

/// Single-valued tag set. Keys are case-sensitive; the reserved key
/// `kuma.io/service` identifies the service name when present. The value
/// `*` matches any value for its key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a tag set naming only a service
    pub fn of_service(service: &str) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(SERVICE_TAG.to_string(), service.to_string());
        Self(tags)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of the reserved service tag, when present
    pub fn service(&self) -> Option<&str> {
        self.get(SERVICE_TAG)
    }

    /// Whether the service tag is the `*` wildcard
    pub fn is_match_all_service(&self) -> bool {
        self.service() == Some(MATCH_ALL)
    }

    /// All pairs except the service tag, in key order
    pub fn without_service(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != SERVICE_TAG)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Restrict to the named keys, dropping the rest. Used by virtual
    /// outbound templates to project a real service's tags down to the
    /// parameter list the template names.
    pub fn project(&self, keys: &[String]) -> TagSet {
        let mut projected = BTreeMap::new();
        for key in keys {
            if let Some(value) = self.0.get(key) {
                projected.insert(key.clone(), value.clone());
            }
        }
        Self(projected)
    }

    /// Merge `other` over `self`; `other`'s values win on key collision
    pub fn merged_with(&self, other: &TagSet) -> TagSet {
        let mut merged = self.0.clone();
        for (k, v) in &other.0 {
            merged.insert(k.clone(), v.clone());
        }
        Self(merged)
    }

    /// Whether this selector matches the given concrete tags. Every key in
    /// the selector must be present with an equal value, or carry the `*`
    /// wildcard.
    pub fn matches(&self, tags: &TagSet) -> bool {
        self.0.iter().all(|(k, v)| match tags.get(k) {
            Some(actual) => v == MATCH_ALL || v == actual,
            None => false,
        })
    }
}

impl FromIterator<(String, String)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TagSet {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }
}

/// Multi-valued tag set: one service can expose several values per tag key
/// (for example multiple versions behind one name). Used by the SNI
/// selector matcher, never by the codec itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiValueTagSet(BTreeMap<String, BTreeSet<String>>);

impl MultiValueTagSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().insert(value.into());
    }

    /// Pairs of (key, sorted values), in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Collect the multi-value view of a list of single-valued tag sets
    pub fn collect(tag_sets: &[TagSet]) -> Self {
        let mut multi = Self::new();
        for tags in tag_sets {
            for (k, v) in tags.iter() {
                multi.add(k, v);
            }
        }
        multi
    }
}
