//! Selection of the objects to download from a bucket listing
mod predicates;
pub(crate) use self::predicates::*;
use crate::family::ProductFamily;
use crate::objectkey::ObjectKey;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::Date;

/// An inclusive range of calendar dates
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    pub(crate) fn new(start: Date, end: Date) -> Result<DateRange, FilterSpecError> {
        if start > end {
            Err(FilterSpecError::InvertedRange { start, end })
        } else {
            Ok(DateRange { start, end })
        }
    }

    pub(crate) fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// A set of filenames to match exactly, parsed from a comma-separated list
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct NameSet(BTreeSet<String>);

impl NameSet {
    /// Test whether the filename of `key`, with or without its final
    /// extension, is in the set
    pub(crate) fn admits(&self, key: &ObjectKey) -> bool {
        self.0.contains(key.name()) || self.0.contains(key.name_without_extension())
    }
}

impl FromStr for NameSet {
    type Err = FilterSpecError;

    fn from_str(s: &str) -> Result<NameSet, FilterSpecError> {
        let names = s
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .collect::<BTreeSet<_>>();
        if names.is_empty() {
            Err(FilterSpecError::EmptyNames)
        } else {
            Ok(NameSet(names))
        }
    }
}

/// A set of file extensions (without leading periods).  The empty set admits
/// every key.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct FileTypeSet(BTreeSet<String>);

impl FileTypeSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn admits(&self, key: &ObjectKey) -> bool {
        self.is_empty() || key.extension().is_some_and(|ext| self.0.contains(ext))
    }
}

impl<S: AsRef<str>> FromIterator<S> for FileTypeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        FileTypeSet(
            iter.into_iter()
                .map(|ext| {
                    let ext = ext.as_ref().trim();
                    ext.strip_prefix('.').unwrap_or(ext).to_owned()
                })
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }
}

/// A single filter chosen by the user
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Predicate {
    /// Files dated within the given range
    DateRange(DateRange),

    /// Files whose names contain the given text
    Substring(String),

    /// Files with one of the given names
    ExactNames(NameSet),

    /// Every file under the prefix
    AllFiles,
}

impl Predicate {
    /// Construct a `Substring` predicate, rejecting blank text
    pub(crate) fn substring(text: &str) -> Result<Predicate, FilterSpecError> {
        let text = text.trim();
        if text.is_empty() {
            Err(FilterSpecError::EmptySearch)
        } else {
            Ok(Predicate::Substring(text.to_owned()))
        }
    }

    /// Run the predicate against the complete listing `keys`
    fn apply<'a>(&self, keys: &'a [ObjectKey], scope: &Scope<'_>) -> Vec<&'a ObjectKey> {
        match self {
            Predicate::DateRange(range) => {
                by_date_range(keys, range, scope.family, scope.path_was_explicit)
            }
            Predicate::Substring(text) => by_substring(keys, text),
            Predicate::ExactNames(names) => by_exact_names(keys, names),
            Predicate::AllFiles => all_files(keys, scope.prefix),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::DateRange(range) => write!(f, "dated {range}"),
            Predicate::Substring(text) => write!(f, "name contains {text:?}"),
            Predicate::ExactNames(NameSet(names)) => write!(f, "name is one of {names:?}"),
            Predicate::AllFiles => write!(f, "all files"),
        }
    }
}

/// The complete set of filters to apply to a listing: one or more predicates,
/// all of which a key must satisfy, plus an optional restriction on file
/// extensions
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct FilterSpec {
    predicates: Vec<Predicate>,
    file_types: FileTypeSet,
}

impl FilterSpec {
    pub(crate) fn new(
        predicates: Vec<Predicate>,
        file_types: FileTypeSet,
    ) -> Result<FilterSpec, FilterSpecError> {
        if predicates.is_empty() {
            Err(FilterSpecError::NoPredicate)
        } else {
            Ok(FilterSpec {
                predicates,
                file_types,
            })
        }
    }

    pub(crate) fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub(crate) fn file_types(&self) -> &FileTypeSet {
        &self.file_types
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub(crate) enum FilterSpecError {
    #[error("no filter selected; pass at least one of --start-date, --search, --names, or --all")]
    NoPredicate,
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: Date, end: Date },
    #[error("search text is empty")]
    EmptySearch,
    #[error("no file names given")]
    EmptyNames,
}

/// Facts about the listing being filtered that some predicates depend on
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Scope<'a> {
    /// Family of the selected product
    pub(crate) family: &'a ProductFamily,

    /// Whether the user supplied the bucket & prefix instead of using the
    /// product's default folder
    pub(crate) path_was_explicit: bool,

    /// The key prefix that was listed
    pub(crate) prefix: &'a str,
}

/// Return the keys in `keys` that satisfy every predicate in `spec` and that
/// have one of the spec's file types.
///
/// Each predicate is evaluated against the full listing and the results are
/// intersected.  The output follows the order of `keys`, with duplicates
/// removed.
pub(crate) fn select(keys: &[ObjectKey], spec: &FilterSpec, scope: &Scope<'_>) -> Vec<ObjectKey> {
    let Some(matched) = spec
        .predicates
        .iter()
        .map(|pred| {
            let matches = pred.apply(keys, scope);
            tracing::debug!(filter = %pred, matches = matches.len(), "Applied filter to listing");
            matches.into_iter().collect::<HashSet<_>>()
        })
        .reduce(|acc, matches| acc.intersection(&matches).copied().collect())
    else {
        return Vec::new();
    };
    let mut emitted = HashSet::new();
    let intersected = keys
        .iter()
        .filter(|&key| matched.contains(key) && emitted.insert(key))
        .cloned()
        .collect::<Vec<_>>();
    // File types narrow the intersection; they never select on their own:
    by_file_type(&intersected, &spec.file_types)
        .into_iter()
        .cloned()
        .collect()
}
