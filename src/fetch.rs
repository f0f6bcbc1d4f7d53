//! Listing, filtering, and downloading the objects for a single run
use crate::consts::DOWNLOAD_TEMP_PREFIX;
use crate::family::ProductFamily;
use crate::filter::{select, FilterSpec, Scope};
use crate::objectkey::ObjectKey;
use crate::s3::{ObjectStore, S3Location};
use anyhow::Context;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use time::{macros::format_description, OffsetDateTime};

/// Everything needed to carry out a run once credentials are in hand
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Request {
    /// Bucket & prefix to list
    pub(crate) location: S3Location,

    /// Whether `location` was given by the user rather than taken from the
    /// product catalog
    pub(crate) path_was_explicit: bool,

    /// Family of the selected product
    pub(crate) family: ProductFamily,

    pub(crate) filter: FilterSpec,

    /// Local directory to download into
    pub(crate) outdir: PathBuf,

    /// Report the selected keys instead of downloading them
    pub(crate) dry_run: bool,
}

/// How a run ended
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Outcome {
    /// The given number of objects were downloaded
    Downloaded { count: usize },

    /// Dry run; these keys would have been downloaded
    Listed { keys: Vec<ObjectKey> },

    /// The listing contained no objects matching the filters
    NoMatches,
}

/// The default download directory: `{family}_{YYYYMMDD}_{HHMMSS}`
pub(crate) fn default_outdir(
    family: &ProductFamily,
    when: OffsetDateTime,
) -> Result<PathBuf, time::error::Format> {
    let stamp = when.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    Ok(PathBuf::from(format!("{family}_{stamp}")))
}

/// List the objects at the request's location, select those matching its
/// filters, and download them
pub(crate) async fn execute<S: ObjectStore>(
    store: &S,
    request: &Request,
) -> anyhow::Result<Outcome> {
    tracing::info!(location = %request.location, "Listing objects ...");
    let keys = store.list_keys(&request.location).await?;
    tracing::info!(count = keys.len(), "Found objects in bucket");
    let scope = Scope {
        family: &request.family,
        path_was_explicit: request.path_was_explicit,
        prefix: request.location.key(),
    };
    tracing::info!("Filtering objects ...");
    let selected = select(&keys, &request.filter, &scope);
    if selected.is_empty() {
        return Ok(Outcome::NoMatches);
    }
    tracing::info!(count = selected.len(), "Selected objects for download");
    if request.dry_run {
        return Ok(Outcome::Listed { keys: selected });
    }
    let plan = DownloadPlan {
        outdir: request.outdir.clone(),
        location: request.location.clone(),
        keys: selected,
    };
    let count = plan.run(store).await?;
    Ok(Outcome::Downloaded { count })
}

/// A resolved set of objects to download into a local directory
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct DownloadPlan {
    outdir: PathBuf,

    /// Location the keys were listed from; supplies the bucket
    location: S3Location,

    keys: Vec<ObjectKey>,
}

impl DownloadPlan {
    /// Download each object, one at a time in order, into the output
    /// directory under its filename.  Returns the number of objects
    /// downloaded.
    ///
    /// The first failure ends the run; objects downloaded before it are left
    /// in place.
    async fn run<S: ObjectStore>(&self, store: &S) -> anyhow::Result<usize> {
        tracing::trace!(path = %self.outdir.display(), "Creating output directory");
        fs_err::create_dir_all(&self.outdir)?;
        let mut names = HashSet::new();
        let mut count = 0;
        for key in &self.keys {
            let name = key.name();
            if matches!(name, "" | "." | "..") {
                tracing::warn!(%key, "Object key does not end in a usable filename; skipping");
                continue;
            }
            if !names.insert(name) {
                tracing::warn!(
                    %key,
                    "Another object with the same filename was already downloaded; overwriting it"
                );
            }
            let path = self.outdir.join(name);
            self.download(store, key, &path).await?;
            tracing::info!(path = %path.display(), "Downloaded: {key}");
            count += 1;
        }
        Ok(count)
    }

    #[tracing::instrument(skip_all, fields(key = %key))]
    async fn download<S: ObjectStore>(
        &self,
        store: &S,
        key: &ObjectKey,
        path: &Path,
    ) -> anyhow::Result<()> {
        let url = self.location.with_key(key.as_str());
        tracing::trace!("Opening temporary output file");
        let outfile = tempfile::Builder::new()
            .prefix(DOWNLOAD_TEMP_PREFIX)
            .tempfile_in(&self.outdir)
            .with_context(|| format!("failed to create temporary output file for {url}"))?;
        match store.download_object(&url, outfile.as_file()).await {
            Ok(()) => {
                tracing::trace!(
                    dest = %path.display(),
                    "Moving temporary output file to destination"
                );
                outfile.persist(path).with_context(|| {
                    format!(
                        "failed to persist temporary output file to {}",
                        path.display()
                    )
                })?;
                Ok(())
            }
            Err(e) => {
                let e = anyhow::Error::from(e);
                tracing::error!(error = ?e, "Failed to download object");
                if let Err(e2) = outfile.close() {
                    tracing::warn!(error = ?e2, "Failed to clean up temporary download file");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Predicate;
    use crate::s3::{DownloadError, ListObjectsError};
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use time::macros::datetime;

    /// An in-memory bucket
    #[derive(Debug, Default)]
    struct MemoryStore {
        objects: BTreeMap<String, Vec<u8>>,
        listed: Mutex<Vec<S3Location>>,
        fetched: Mutex<Vec<String>>,
    }

    impl MemoryStore {
        fn new(objects: &[(&str, &str)]) -> MemoryStore {
            MemoryStore {
                objects: objects
                    .iter()
                    .map(|&(k, v)| (k.to_owned(), v.as_bytes().to_vec()))
                    .collect(),
                ..MemoryStore::default()
            }
        }
    }

    impl ObjectStore for MemoryStore {
        async fn list_keys(
            &self,
            location: &S3Location,
        ) -> Result<Vec<ObjectKey>, ListObjectsError> {
            self.listed.lock().unwrap().push(location.clone());
            Ok(self
                .objects
                .keys()
                .filter(|k| k.starts_with(location.key()))
                .map(|k| ObjectKey::from(k.as_str()))
                .collect())
        }

        async fn download_object(
            &self,
            location: &S3Location,
            outfile: &File,
        ) -> Result<(), DownloadError> {
            self.fetched.lock().unwrap().push(location.key().to_owned());
            let mut outfile = outfile;
            outfile
                .write_all(&self.objects[location.key()])
                .map_err(|source| DownloadError::Write {
                    url: location.clone(),
                    source,
                })
        }
    }

    fn request(outdir: &Path, predicates: Vec<Predicate>, file_types: &[&str]) -> Request {
        Request {
            location: "s3://fnbo-drop/in/".parse().unwrap(),
            path_was_explicit: false,
            family: ProductFamily::Fnbo,
            filter: FilterSpec::new(predicates, file_types.iter().collect()).unwrap(),
            outdir: outdir.to_owned(),
            dry_run: false,
        }
    }

    fn bucket() -> MemoryStore {
        MemoryStore::new(&[
            ("in/", ""),
            ("in/acct_transaction_20240301.txt", "A"),
            ("in/batch_transaction_20240302.txt", "B"),
            ("in/batch_transaction_20240303.json", "C"),
            ("in/batch_notes.txt", "D"),
            ("in/sub/", ""),
            ("other/batch_transaction_20240302.txt", "X"),
        ])
    }

    #[tokio::test]
    async fn downloads_selection() {
        let tmpdir = tempfile::tempdir().unwrap();
        let outdir = tmpdir.path().join("FNBO_out");
        let store = bucket();
        let req = request(
            &outdir,
            vec![Predicate::substring("batch").unwrap()],
            &["txt"],
        );
        let outcome = execute(&store, &req).await.unwrap();
        assert_eq!(outcome, Outcome::Downloaded { count: 2 });
        assert_eq!(
            *store.listed.lock().unwrap(),
            ["s3://fnbo-drop/in/".parse::<S3Location>().unwrap()]
        );
        assert_eq!(
            *store.fetched.lock().unwrap(),
            ["in/batch_notes.txt", "in/batch_transaction_20240302.txt"]
        );
        assert_eq!(
            fs_err::read_to_string(outdir.join("batch_transaction_20240302.txt")).unwrap(),
            "B"
        );
        assert_eq!(
            fs_err::read_to_string(outdir.join("batch_notes.txt")).unwrap(),
            "D"
        );
        let mut entries = fs_err::read_dir(&outdir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries, ["batch_notes.txt", "batch_transaction_20240302.txt"]);
    }

    #[tokio::test]
    async fn all_files_skips_folder_placeholders() {
        let tmpdir = tempfile::tempdir().unwrap();
        let store = bucket();
        let req = request(tmpdir.path(), vec![Predicate::AllFiles], &[]);
        let outcome = execute(&store, &req).await.unwrap();
        assert_eq!(outcome, Outcome::Downloaded { count: 4 });
        assert!(!store.fetched.lock().unwrap().iter().any(|k| k.ends_with('/')));
    }

    #[tokio::test]
    async fn empty_folder_without_trailing_slash_matches_nothing() {
        let tmpdir = tempfile::tempdir().unwrap();
        let outdir = tmpdir.path().join("never-created");
        let store = MemoryStore::new(&[("in/", "")]);
        let mut req = request(&outdir, vec![Predicate::AllFiles], &[]);
        req.location = "s3://fnbo-drop/in".parse().unwrap();
        assert_eq!(execute(&store, &req).await.unwrap(), Outcome::NoMatches);
        assert!(store.fetched.lock().unwrap().is_empty());
        assert!(!outdir.exists());
    }

    #[tokio::test]
    async fn dry_run_all_files_omits_folder_marker() {
        let tmpdir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(&[("in/", ""), ("in/a.txt", "A")]);
        let mut req = request(tmpdir.path(), vec![Predicate::AllFiles], &[]);
        req.location = "s3://fnbo-drop/in".parse().unwrap();
        req.dry_run = true;
        assert_eq!(
            execute(&store, &req).await.unwrap(),
            Outcome::Listed {
                keys: vec![ObjectKey::from("in/a.txt")]
            }
        );
    }

    #[tokio::test]
    async fn no_matches() {
        let tmpdir = tempfile::tempdir().unwrap();
        let outdir = tmpdir.path().join("never-created");
        let store = bucket();
        let req = request(
            &outdir,
            vec![Predicate::substring("nothing-like-this").unwrap()],
            &[],
        );
        assert_eq!(execute(&store, &req).await.unwrap(), Outcome::NoMatches);
        assert!(store.fetched.lock().unwrap().is_empty());
        assert!(!outdir.exists());
    }

    #[tokio::test]
    async fn dry_run_lists_without_downloading() {
        let tmpdir = tempfile::tempdir().unwrap();
        let outdir = tmpdir.path().join("never-created");
        let store = bucket();
        let mut req = request(
            &outdir,
            vec![Predicate::substring("transaction").unwrap()],
            &["txt"],
        );
        req.dry_run = true;
        assert_eq!(
            execute(&store, &req).await.unwrap(),
            Outcome::Listed {
                keys: vec![
                    ObjectKey::from("in/acct_transaction_20240301.txt"),
                    ObjectKey::from("in/batch_transaction_20240302.txt"),
                ]
            }
        );
        assert!(store.fetched.lock().unwrap().is_empty());
        assert!(!outdir.exists());
    }

    #[test]
    fn default_outdir_format() {
        assert_eq!(
            default_outdir(&ProductFamily::Nf, datetime!(2024-03-15 09:05:07 UTC)).unwrap(),
            PathBuf::from("NF_20240315_090507")
        );
    }
}
