use std::fmt;

/// The key of an object in an S3 bucket, as returned by a listing.
///
/// Unlike local paths, keys are not validated: a listing may contain folder
/// placeholders (keys ending in a forward slash) and other oddities, all of
/// which the filters must tolerate.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct ObjectKey(String);

impl ObjectKey {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the filename portion of the key, i.e., everything after the
    /// last forward slash.  This is empty for folder placeholders.
    pub(crate) fn name(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, post)) => post,
            None => &self.0,
        }
    }

    /// Return the portion of the filename before its first period
    pub(crate) fn stem(&self) -> &str {
        let name = self.name();
        name.split_once('.').map_or(name, |(pre, _)| pre)
    }

    /// Return the portion of the filename after its last period, if any
    pub(crate) fn extension(&self) -> Option<&str> {
        self.name().rsplit_once('.').map(|(_, ext)| ext)
    }

    /// Return the filename with its final `.{extension}` removed
    pub(crate) fn name_without_extension(&self) -> &str {
        let name = self.name();
        name.rsplit_once('.').map_or(name, |(pre, _)| pre)
    }
}

impl From<String> for ObjectKey {
    fn from(value: String) -> ObjectKey {
        ObjectKey(value)
    }
}

impl From<&str> for ObjectKey {
    fn from(value: &str) -> ObjectKey {
        ObjectKey(value.to_owned())
    }
}

impl From<ObjectKey> for String {
    fn from(value: ObjectKey) -> String {
        value.0
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for ObjectKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl<'a> PartialEq<&'a str> for ObjectKey {
    fn eq(&self, other: &&'a str) -> bool {
        &self.0 == other
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a/b/report_1.txt", "report_1.txt", "report_1", Some("txt"), "report_1")]
    #[case("report.tar.gz", "report.tar.gz", "report", Some("gz"), "report.tar")]
    #[case("a/b/README", "README", "README", None, "README")]
    #[case("a/b/", "", "", None, "")]
    #[case("a/.env", ".env", "", Some("env"), "")]
    fn components(
        #[case] key: &str,
        #[case] name: &str,
        #[case] stem: &str,
        #[case] extension: Option<&str>,
        #[case] without_ext: &str,
    ) {
        let key = ObjectKey::from(key);
        assert_eq!(key.name(), name);
        assert_eq!(key.stem(), stem);
        assert_eq!(key.extension(), extension);
        assert_eq!(key.name_without_extension(), without_ext);
    }
}
