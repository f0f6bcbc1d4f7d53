/// Catalog of products read when `--config` is not given
pub(crate) static DEFAULT_CATALOG_FILE: &str = "product_configs.csv";

/// Substring that the filenames of dated files must contain when filtering a
/// product's default folder by date
pub(crate) static TRANSACTION_MARKER: &str = "transaction";

/// Region used when neither `--region` nor the AWS environment names one
pub(crate) static DEFAULT_REGION: &str = "us-east-1";

/// Prefix for temporary files that downloads are written to before being
/// moved into place
pub(crate) static DOWNLOAD_TEMP_PREFIX: &str = ".s3prodfetch.download.";

/// Default number of seconds to wait for credentials
pub(crate) const DEFAULT_CREDENTIAL_TIMEOUT_SECS: u64 = 60;
