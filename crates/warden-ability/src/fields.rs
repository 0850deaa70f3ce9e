//! Field sets.
//!
//! Field paths are dotted (`seo.title`). Listing a field grants all of its
//! nested paths: `seo` allows `seo.title` and `seo.meta.description`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

/// Wildcard meaning every field.
pub const WILDCARD: &str = "*";

/// The fields a rule grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSet {
    /// Every field.
    All,
    /// Only the listed paths and their children.
    Only(BTreeSet<String>),
}

impl FieldSet {
    /// The empty set.
    pub fn none() -> Self {
        FieldSet::Only(BTreeSet::new())
    }

    /// Build from a rule's field list.
    ///
    /// `None` and any `*` entry give [`FieldSet::All`]. `a.*` is the same as
    /// `a`. Blank entries are ignored.
    pub fn from_list<I, S>(fields: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(fields) = fields else {
            return FieldSet::All;
        };

        let mut set = BTreeSet::new();
        for field in fields {
            let field = field.as_ref().trim();
            if field == WILDCARD {
                return FieldSet::All;
            }
            let field = field.strip_suffix(".*").unwrap_or(field);
            if !field.is_empty() {
                set.insert(field.to_string());
            }
        }
        FieldSet::Only(set)
    }

    /// Whether this is [`FieldSet::All`].
    pub fn is_all(&self) -> bool {
        matches!(self, FieldSet::All)
    }

    /// Whether no field is granted.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldSet::Only(set) if set.is_empty())
    }

    /// Whether `field` is granted, directly or through a parent path.
    pub fn allows(&self, field: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Only(set) => set.iter().any(|granted| covers(granted, field)),
        }
    }

    /// Whether `field` or any of its nested paths is granted.
    pub fn touches(&self, field: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Only(set) => set
                .iter()
                .any(|granted| covers(granted, field) || covers(field, granted)),
        }
    }

    /// The granted paths below `field`, relative to it.
    ///
    /// Used to sanitize components: if `seo` is granted the component gets
    /// every field; if only `seo.title` is, it gets `title`.
    pub fn descend(&self, field: &str) -> FieldSet {
        match self {
            FieldSet::All => FieldSet::All,
            FieldSet::Only(_) if self.allows(field) => FieldSet::All,
            FieldSet::Only(set) => FieldSet::Only(
                set.iter()
                    .filter_map(|granted| {
                        granted
                            .strip_prefix(field)
                            .and_then(|rest| rest.strip_prefix('.'))
                            .map(str::to_string)
                    })
                    .collect(),
            ),
        }
    }

    /// Grant everything `other` grants.
    pub fn union(&mut self, other: &FieldSet) {
        match (&mut *self, other) {
            (FieldSet::All, _) => {}
            (_, FieldSet::All) => *self = FieldSet::All,
            (FieldSet::Only(mine), FieldSet::Only(theirs)) => {
                mine.extend(theirs.iter().cloned());
            }
        }
    }

    /// The first path segment of every granted field, or `None` for
    /// [`FieldSet::All`].
    pub fn top_level(&self) -> Option<BTreeSet<String>> {
        match self {
            FieldSet::All => None,
            FieldSet::Only(set) => Some(
                set.iter()
                    .map(|f| f.split('.').next().unwrap_or(f).to_string())
                    .collect(),
            ),
        }
    }

    /// Iterate over granted paths. Empty for [`FieldSet::All`].
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let set = match self {
            FieldSet::All => None,
            FieldSet::Only(set) => Some(set),
        };
        set.into_iter().flatten().map(String::as_str)
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        FieldSet::All
    }
}

impl FromIterator<FieldSet> for FieldSet {
    fn from_iter<T: IntoIterator<Item = FieldSet>>(iter: T) -> Self {
        let mut out = FieldSet::none();
        for set in iter {
            out.union(&set);
        }
        out
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSet::All => f.write_str(WILDCARD),
            FieldSet::Only(set) => {
                let fields: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "[{}]", fields.join(", "))
            }
        }
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldSet::All => serializer.serialize_str(WILDCARD),
            FieldSet::Only(set) => set.serialize(serializer),
        }
    }
}

/// Whether granting `parent` grants `field`.
fn covers(parent: &str, field: &str) -> bool {
    field == parent
        || field
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('.'))
}
