//! Subnet selector terms, tag matching, and cache keys
//!
//! A selector is a list of terms combined with OR. Within a term, the ID and
//! every tag constraint combine with AND. A tag key or value of `*` matches
//! any key or value in that position.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::subnet::{Subnet, Tag};

/// Wildcard symbol for tag keys and values
pub const WILDCARD: &str = "*";

/// One clause of a subnet selector
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSelectorTerm {
    /// Exact subnet ID to select
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tags the subnet must carry; `*` as key or value matches anything
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl SubnetSelectorTerm {
    /// Term selecting a single subnet by ID
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            tags: BTreeMap::new(),
        }
    }

    /// Term selecting subnets by tags
    pub fn with_tags<K, V>(tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            id: None,
            tags: tags
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add a tag constraint
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// True when neither an ID nor any tags are set
    pub fn is_empty(&self) -> bool {
        self.id.as_deref().map_or(true, str::is_empty) && self.tags.is_empty()
    }

    /// Tag constraints in canonical (key-sorted) order
    pub fn tag_constraints(&self) -> Vec<TagConstraint> {
        self.tags
            .iter()
            .map(|(k, v)| TagConstraint::new(k, v))
            .collect()
    }

    /// Cache key for this term
    pub fn key(&self) -> SelectorTermKey {
        SelectorTermKey::for_term(self)
    }

    /// Whether `subnet` satisfies this term (ID match AND all tag constraints)
    ///
    /// An empty term matches nothing.
    pub fn matches(&self, subnet: &Subnet) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            if subnet.id != id {
                return false;
            }
        }
        tags_match(&subnet.tags, &self.tag_constraints())
    }
}

/// How one position (key or value) of a tag constraint is matched
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TagPattern {
    /// Matches anything
    Any,
    /// Matches only this exact string
    Exact(String),
}

impl TagPattern {
    /// Parse a selector string, mapping `*` to [`TagPattern::Any`]
    pub fn parse(s: &str) -> Self {
        if s == WILDCARD {
            Self::Any
        } else {
            Self::Exact(s.to_string())
        }
    }

    /// Whether `candidate` satisfies this pattern
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(s) => s == candidate,
        }
    }
}

/// A required tag: some subnet tag must satisfy both key and value patterns
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagConstraint {
    /// Key pattern
    pub key: TagPattern,
    /// Value pattern
    pub value: TagPattern,
}

impl TagConstraint {
    /// Build a constraint from a selector key/value pair
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: TagPattern::parse(key),
            value: TagPattern::parse(value),
        }
    }

    /// Whether this single tag satisfies the constraint
    pub fn matches(&self, tag: &Tag) -> bool {
        self.key.matches(&tag.key) && self.value.matches(&tag.value)
    }
}

/// Whether `subnet_tags` satisfy every constraint
///
/// No constraints means the tag dimension abstains and always matches.
pub fn tags_match(subnet_tags: &[Tag], constraints: &[TagConstraint]) -> bool {
    constraints
        .iter()
        .all(|c| subnet_tags.iter().any(|t| c.matches(t)))
}

/// Order-independent identity of a selector term
///
/// Two terms with the same ID and the same set of tag pairs produce equal
/// keys regardless of how their tags were built.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectorTermKey {
    id: Option<String>,
    tags: Vec<(String, String)>,
}

impl SelectorTermKey {
    /// Compute the key for a term
    pub fn for_term(term: &SubnetSelectorTerm) -> Self {
        let mut tags: Vec<(String, String)> = term
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        // BTreeMap already iterates sorted, but the key must not depend on that
        tags.sort();
        Self {
            id: term.id.clone().filter(|id| !id.is_empty()),
            tags,
        }
    }
}

impl fmt::Display for SelectorTermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id={}", self.id.as_deref().unwrap_or(""))?;
        f.write_str(";tags=")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tagged(tags: &[(&str, &str)]) -> Vec<Tag> {
        tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect()
    }

    #[rstest]
    #[case::exact_match(&[("Name", "a")], &[("Name", "a")], true)]
    #[case::value_mismatch(&[("Name", "a")], &[("Name", "b")], false)]
    #[case::key_missing(&[("Other", "a")], &[("Name", "a")], false)]
    #[case::wildcard_value(&[("Name", "anything")], &[("Name", "*")], true)]
    #[case::wildcard_key(&[("Whatever", "bar")], &[("*", "bar")], true)]
    #[case::wildcard_key_wrong_value(&[("Whatever", "baz")], &[("*", "bar")], false)]
    #[case::wildcard_both(&[("k", "v")], &[("*", "*")], true)]
    #[case::wildcard_both_needs_a_tag(&[], &[("*", "*")], false)]
    #[case::all_pairs_required(&[("a", "1")], &[("a", "1"), ("b", "2")], false)]
    #[case::all_pairs_present(&[("b", "2"), ("a", "1")], &[("a", "1"), ("b", "2")], true)]
    #[case::empty_value_tag(&[("TestTag", "")], &[("TestTag", "*")], true)]
    #[case::no_constraints(&[], &[], true)]
    fn tag_matching(
        #[case] subnet_tags: &[(&str, &str)],
        #[case] term_tags: &[(&str, &str)],
        #[case] expected: bool,
    ) {
        let constraints: Vec<_> = term_tags
            .iter()
            .map(|(k, v)| TagConstraint::new(k, v))
            .collect();
        assert_eq!(tags_match(&tagged(subnet_tags), &constraints), expected);
    }

    #[test]
    fn wildcard_is_a_superset_of_exact() {
        let subnets = [
            tagged(&[("Name", "a")]),
            tagged(&[("Name", "b")]),
            tagged(&[("Other", "a")]),
        ];
        let exact = [TagConstraint::new("Name", "a")];
        let wild_value = [TagConstraint::new("Name", "*")];
        let wild_key = [TagConstraint::new("*", "a")];

        for tags in &subnets {
            if tags_match(tags, &exact) {
                assert!(tags_match(tags, &wild_value));
                assert!(tags_match(tags, &wild_key));
            }
        }
        assert!(tags_match(&subnets[1], &wild_value) && !tags_match(&subnets[1], &exact));
        assert!(tags_match(&subnets[2], &wild_key) && !tags_match(&subnets[2], &exact));
    }

    #[test]
    fn key_ignores_tag_insertion_order() {
        let a = SubnetSelectorTerm::default().tag("b", "2").tag("a", "1");
        let b = SubnetSelectorTerm::with_tags([("a", "1"), ("b", "2")]);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string(), "id=;tags=a=1,b=2");
    }

    #[test]
    fn key_distinguishes_id_and_tags() {
        let by_id = SubnetSelectorTerm::with_id("subnet-test1");
        let by_both = SubnetSelectorTerm::with_id("subnet-test1").tag("foo", "bar");
        assert_ne!(by_id.key(), by_both.key());
        assert_eq!(by_both.key().to_string(), "id=subnet-test1;tags=foo=bar");
    }

    #[test]
    fn empty_id_is_treated_as_unset() {
        let term = SubnetSelectorTerm {
            id: Some(String::new()),
            tags: BTreeMap::from([("foo".to_string(), "bar".to_string())]),
        };
        assert_eq!(term.key(), SubnetSelectorTerm::with_tags([("foo", "bar")]).key());
    }

    #[test]
    fn term_requires_id_and_tags_intersection() {
        let subnet = Subnet {
            id: "subnet-test2".to_string(),
            tags: tagged(&[("Name", "test-subnet-2"), ("foo", "bar")]),
            ..Default::default()
        };
        assert!(SubnetSelectorTerm::with_id("subnet-test2").matches(&subnet));
        assert!(SubnetSelectorTerm::with_id("subnet-test2")
            .tag("foo", "bar")
            .matches(&subnet));
        assert!(!SubnetSelectorTerm::with_id("subnet-test2")
            .tag("foo", "baz")
            .matches(&subnet));
        assert!(!SubnetSelectorTerm::with_id("subnet-test1")
            .tag("foo", "bar")
            .matches(&subnet));
    }

    #[test]
    fn empty_term_matches_nothing() {
        let subnet = Subnet {
            id: "subnet-test1".to_string(),
            ..Default::default()
        };
        assert!(SubnetSelectorTerm::default().is_empty());
        assert!(!SubnetSelectorTerm::default().matches(&subnet));
    }

    #[test]
    fn term_parses_from_yaml() {
        let yaml = "id: subnet-test1\ntags:\n  foo: bar\n  Name: '*'\n";
        let term: SubnetSelectorTerm = serde_yaml::from_str(yaml).expect("term should parse");
        assert_eq!(term.id.as_deref(), Some("subnet-test1"));
        assert_eq!(
            term.tag_constraints(),
            vec![
                TagConstraint {
                    key: TagPattern::Exact("Name".to_string()),
                    value: TagPattern::Any,
                },
                TagConstraint::new("foo", "bar"),
            ]
        );
    }
}
