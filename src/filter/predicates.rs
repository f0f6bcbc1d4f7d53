//! The individual filters that can be applied to a bucket listing.  Each one
//! is evaluated against the complete listing and returns the matching keys in
//! listing order; none of them ever fail; keys that cannot be evaluated
//! (e.g., undated files under a date filter) simply don't match.
use super::{DateRange, FileTypeSet, NameSet};
use crate::consts::TRANSACTION_MARKER;
use crate::family::ProductFamily;
use crate::objectkey::ObjectKey;

/// Select keys whose filenames carry a date stamp within `range`.
///
/// The date is read from the end of the filename's stem in the layout used
/// by `family`; families without a known layout match nothing.  Unless
/// `path_was_explicit` is true, the filename must also contain
/// `"transaction"`, as the default folder of every product only holds dated
/// transaction files.
pub(crate) fn by_date_range<'a>(
    keys: &'a [ObjectKey],
    range: &DateRange,
    family: &ProductFamily,
    path_was_explicit: bool,
) -> Vec<&'a ObjectKey> {
    let Some(stamp) = family.date_stamp() else {
        tracing::debug!(%family, "Product family has no date layout; date filter matches nothing");
        return Vec::new();
    };
    keys.iter()
        .filter(|key| {
            stamp
                .parse_suffix(key.stem())
                .is_ok_and(|date| range.contains(date))
                && (path_was_explicit || key.name().contains(TRANSACTION_MARKER))
        })
        .collect()
}

/// Select keys whose filenames contain `text` (with surrounding whitespace
/// removed) verbatim
pub(crate) fn by_substring<'a>(keys: &'a [ObjectKey], text: &str) -> Vec<&'a ObjectKey> {
    let text = text.trim();
    keys.iter()
        .filter(|key| key.name().contains(text))
        .collect()
}

/// Select keys whose filename, either with or without its extension, is one
/// of `names`
pub(crate) fn by_exact_names<'a>(keys: &'a [ObjectKey], names: &NameSet) -> Vec<&'a ObjectKey> {
    keys.iter().filter(|key| names.admits(key)).collect()
}

/// Select every key except the placeholder entry that a listing returns for
/// `prefix` itself.  A prefix without a trailing slash also names the
/// `{prefix}/` folder placeholder.
pub(crate) fn all_files<'a>(keys: &'a [ObjectKey], prefix: &str) -> Vec<&'a ObjectKey> {
    let is_marker = |key: &str| {
        key == prefix
            || (!prefix.is_empty()
                && !prefix.ends_with('/')
                && key.strip_prefix(prefix) == Some("/"))
    };
    keys.iter().filter(|key| !is_marker(key.as_str())).collect()
}

/// Select keys whose extension is in `extensions`.  An empty set selects
/// everything.
pub(crate) fn by_file_type<'a>(
    keys: &'a [ObjectKey],
    extensions: &FileTypeSet,
) -> Vec<&'a ObjectKey> {
    keys.iter().filter(|key| extensions.admits(key)).collect()
}
