//! Match specifications and the shared scan predicate
//!
//! Both the prefiltered and the direct scan path end in [`Predicate::evaluate`],
//! so they select exactly the same records.

use std::collections::BTreeMap;

use crate::codec;
use crate::storage::find;

/// Substrings that must all occur in a value (AND)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSet {
    terms: Vec<Vec<u8>>,
}

impl MatchSet {
    /// A set that requires every term
    pub fn all<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self {
            terms: terms.into_iter().map(|t| t.as_ref().to_vec()).collect(),
        }
    }

    /// A set with a single term
    pub fn one(term: impl AsRef<[u8]>) -> Self {
        Self {
            terms: vec![term.as_ref().to_vec()],
        }
    }

    pub fn terms(&self) -> &[Vec<u8>] {
        &self.terms
    }
}

impl From<&str> for MatchSet {
    fn from(term: &str) -> Self {
        Self::one(term)
    }
}

impl From<&[u8]> for MatchSet {
    fn from(term: &[u8]) -> Self {
        Self::one(term)
    }
}

/// Alternative match sets (OR of ANDs)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSpec {
    sets: Vec<MatchSet>,
}

impl MatchSpec {
    pub fn new(sets: impl IntoIterator<Item = MatchSet>) -> Self {
        Self {
            sets: sets.into_iter().collect(),
        }
    }

    /// Any one of the given terms
    pub fn any<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self::new(terms.into_iter().map(MatchSet::one))
    }

    pub fn sets(&self) -> &[MatchSet] {
        &self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl From<&str> for MatchSpec {
    fn from(term: &str) -> Self {
        Self::new([MatchSet::one(term)])
    }
}

impl From<MatchSet> for MatchSpec {
    fn from(set: MatchSet) -> Self {
        Self::new([set])
    }
}

/// Shape of scan results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectMode {
    /// Key and value
    #[default]
    Pairs,
    /// Keys only
    Keys,
    /// Values only
    Values,
}

/// One decoded scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    Pair(Vec<u8>, Vec<u8>),
    Key(Vec<u8>),
    Value(Vec<u8>),
}

/// Accumulated results of a `select`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Pairs(BTreeMap<Vec<u8>, Vec<u8>>),
    Keys(Vec<Vec<u8>>),
    Values(Vec<Vec<u8>>),
}

impl Selection {
    pub fn empty(mode: SelectMode) -> Self {
        match mode {
            SelectMode::Pairs => Selection::Pairs(BTreeMap::new()),
            SelectMode::Keys => Selection::Keys(Vec::new()),
            SelectMode::Values => Selection::Values(Vec::new()),
        }
    }

    /// Add one result; `item` must have been produced for this selection's mode
    pub(crate) fn push(&mut self, item: ScanItem) {
        debug_assert_eq!(
            selection_kind(self),
            item_kind(&item),
            "scan item does not fit selection"
        );
        match (self, item) {
            (Selection::Pairs(map), ScanItem::Pair(k, v)) => {
                map.insert(k, v);
            }
            (Selection::Keys(keys), ScanItem::Key(k)) => keys.push(k),
            (Selection::Values(values), ScanItem::Value(v)) => values.push(v),
            (selection, item) => {
                tracing::warn!(?item, "scan item does not fit {:?} selection", selection_kind(selection));
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::Pairs(map) => map.len(),
            Selection::Keys(keys) => keys.len(),
            Selection::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn selection_kind(selection: &Selection) -> SelectMode {
    match selection {
        Selection::Pairs(_) => SelectMode::Pairs,
        Selection::Keys(_) => SelectMode::Keys,
        Selection::Values(_) => SelectMode::Values,
    }
}

fn item_kind(item: &ScanItem) -> SelectMode {
    match item {
        ScanItem::Pair(..) => SelectMode::Pairs,
        ScanItem::Key(_) => SelectMode::Keys,
        ScanItem::Value(_) => SelectMode::Values,
    }
}

/// Encoded AND/OR predicate evaluated against raw record lines
#[derive(Debug, Clone)]
pub struct Predicate {
    sets: Vec<Vec<Vec<u8>>>,
    case_sensitive: bool,
}

impl Predicate {
    pub fn new(spec: &MatchSpec, case_sensitive: bool) -> Self {
        let sets = spec
            .sets()
            .iter()
            .map(|set| {
                set.terms()
                    .iter()
                    .map(|term| {
                        let encoded = codec::encode(term);
                        if case_sensitive {
                            encoded
                        } else {
                            encoded.to_ascii_lowercase()
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            sets,
            case_sensitive,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Every encoded term, in spec order
    pub fn patterns(&self) -> Vec<Vec<u8>> {
        self.sets.iter().flatten().cloned().collect()
    }

    /// True when the encoded value satisfies at least one set
    pub fn matches(&self, encoded_value: &[u8]) -> bool {
        let folded;
        let value = if self.case_sensitive {
            encoded_value
        } else {
            folded = encoded_value.to_ascii_lowercase();
            folded.as_slice()
        };

        self.sets
            .iter()
            .any(|set| set.iter().all(|term| contains_aligned(value, term)))
    }

    /// Match one raw record line and decode it per `mode`
    ///
    /// Lines without a field delimiter yield `None`.
    pub fn evaluate(&self, line: &[u8], field_delimiter: &[u8], mode: SelectMode) -> Option<ScanItem> {
        let split = find(line, field_delimiter)?;
        let key = &line[..split];
        let value = &line[split + field_delimiter.len()..];
        if !self.matches(value) {
            return None;
        }

        Some(match mode {
            SelectMode::Pairs => ScanItem::Pair(codec::decode(key), codec::decode(value)),
            SelectMode::Keys => ScanItem::Key(codec::decode(key)),
            SelectMode::Values => ScanItem::Value(codec::decode(value)),
        })
    }
}

/// Occurrence of `needle` that starts on an escape-token boundary
fn contains_aligned(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    let mut from = 0;
    while from < haystack.len() {
        let Some(i) = find(&haystack[from..], needle) else {
            return false;
        };
        let at = from + i;
        if !codec::is_mid_token(haystack, at) {
            return true;
        }
        from = at + 1;
    }
    false
}
