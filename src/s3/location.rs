use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A bucket together with a key or key prefix within it
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct S3Location {
    /// The bucket name
    bucket: String,

    /// The key or key prefix
    key: String,
}

impl S3Location {
    /// Construct a new `S3Location` for the given bucket & key
    pub(crate) fn new(bucket: String, key: String) -> S3Location {
        S3Location { bucket, key }
    }

    /// Returns the bucket name
    pub(crate) fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the key
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Return a new `S3Location` with the same bucket and using the given key.
    pub(crate) fn with_key<S: Into<String>>(&self, key: S) -> S3Location {
        S3Location {
            bucket: self.bucket.clone(),
            key: key.into(),
        }
    }
}

impl fmt::Display for S3Location {
    /// Format an `S3Location` as an S3 URL
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl FromStr for S3Location {
    type Err = S3LocationError;

    /// Parse an `S3Location` from either an S3 URL or a bare
    /// `{bucket}/{prefix}` path.
    fn from_str(s: &str) -> Result<S3Location, S3LocationError> {
        // <https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html>
        // Legacy us-east-1 buckets may also use uppercase letters and
        // underscores.
        fn is_bucket_char(c: char) -> bool {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
        }

        let s = s.trim();
        let s = match s.split_once("://") {
            Some(("s3", rest)) => rest,
            Some((scheme, _)) if !scheme.contains('/') => return Err(S3LocationError::BadScheme),
            _ => s,
        };
        let Some((bucket, key)) = s.split_once('/') else {
            return Err(S3LocationError::NoKey);
        };
        if bucket.is_empty() || !bucket.chars().all(is_bucket_char) {
            return Err(S3LocationError::BadBucket);
        }
        Ok(S3Location {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        })
    }
}

/// Error returned when parsing an invalid S3 path
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub(crate) enum S3LocationError {
    /// The path has a URL scheme other than `s3://`
    #[error(r#"URL scheme is not "s3://""#)]
    BadScheme,

    /// The path does not contain a slash after the bucket name
    #[error("path does not contain a key prefix after the bucket name")]
    NoKey,

    /// The bucket name is invalid
    #[error("invalid S3 bucket name")]
    BadBucket,
}
