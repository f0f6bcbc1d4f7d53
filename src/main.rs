mod catalog;
mod consts;
mod credentials;
mod family;
mod fetch;
mod filter;
mod objectkey;
mod s3;
mod timestamps;
use crate::catalog::{ProductCatalog, ProductConfig};
use crate::consts::{DEFAULT_CATALOG_FILE, DEFAULT_CREDENTIAL_TIMEOUT_SECS};
use crate::credentials::{
    fetch_with_timeout, CommandProvider, CredentialSource, ProfileProvider,
};
use crate::fetch::{default_outdir, Outcome, Request};
use crate::filter::{DateRange, FileTypeSet, FilterSpec, FilterSpecError, Predicate};
use crate::s3::{ClientSettings, S3Client, S3Location};
use crate::timestamps::parse_cli_date;
use anyhow::Context;
use clap::Parser;
use std::io::{stderr, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use time::{Date, OffsetDateTime};
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt::time::OffsetTime, prelude::*};

/// Download a filtered selection of a product's files from S3
///
/// At least one of `--start-date`, `--search`, `--names`, or `--all` must be
/// given.  When several are given, only files matching all of them are
/// downloaded.
#[derive(Clone, Debug, Parser)]
#[command(version)]
struct Arguments {
    /// Only download files whose names end in a date within the given range.
    ///
    /// Dates are given as `YYYY-MM-DD`.  `--end-date` defaults to today.
    #[arg(long, value_name = "DATE", value_parser = parse_cli_date)]
    start_date: Option<Date>,

    /// End of the date range (inclusive); defaults to today
    #[arg(long, value_name = "DATE", value_parser = parse_cli_date, requires = "start_date")]
    end_date: Option<Date>,

    /// Only download files whose names contain the given text
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,

    /// Only download files with the given names (comma-separated), with or
    /// without extensions
    #[arg(long, value_name = "LIST")]
    names: Option<String>,

    /// Download every file in the folder
    #[arg(long)]
    all: bool,

    /// Only download files with the given extension.  May be given multiple
    /// times or as a comma-separated list.  By default, all file types are
    /// downloaded.
    #[arg(short = 't', long, value_name = "EXT", value_delimiter = ',')]
    file_type: Vec<String>,

    /// Path to the CSV file listing products and their accounts, buckets,
    /// and folders
    #[arg(short, long, default_value = DEFAULT_CATALOG_FILE, value_name = "FILE")]
    config: PathBuf,

    /// Print the names of the products in the catalog and exit
    #[arg(long)]
    list_products: bool,

    /// Download from the given `s3://{bucket}/{prefix}` (or
    /// `{bucket}/{prefix}`) instead of the product's default folder.
    ///
    /// When this is given, `--start-date` filtering does not require
    /// filenames to contain "transaction".
    #[arg(long, value_name = "S3PATH")]
    s3_path: Option<S3Location>,

    /// Directory to download files into.  Defaults to a new directory named
    /// after the product family and the current time.
    #[arg(short, long, value_name = "DIR")]
    outdir: Option<PathBuf>,

    /// Print the keys of the files that would be downloaded instead of
    /// downloading them
    #[arg(long)]
    dry_run: bool,

    /// Obtain credentials by running the given program with the product's
    /// account ID as its last argument.  The program must print credentials
    /// in AWS `credential_process` JSON format.
    ///
    /// If not given, credentials are taken from the AWS environment.
    #[arg(long, value_name = "PROGRAM", env = "S3PRODFETCH_CREDENTIAL_COMMAND")]
    credential_command: Option<PathBuf>,

    /// Extra argument to pass to the credential command before the account
    /// ID.  May be given multiple times.
    #[arg(long, value_name = "ARG", allow_hyphen_values = true, requires = "credential_command")]
    credential_arg: Vec<String>,

    /// Name of the AWS profile to take credentials from when no
    /// `--credential-command` is given
    #[arg(long, value_name = "NAME", conflicts_with = "credential_command")]
    profile: Option<String>,

    /// Number of seconds to wait for credentials before giving up
    #[arg(long, default_value_t = DEFAULT_CREDENTIAL_TIMEOUT_SECS, value_name = "SECS")]
    credential_timeout: u64,

    /// AWS region of the bucket
    #[arg(long)]
    region: Option<String>,

    /// Custom S3 endpoint URL
    #[arg(long, value_name = "URL")]
    endpoint_url: Option<String>,

    /// Set logging level
    #[arg(
        short,
        long,
        default_value = "INFO",
        value_name = "ERROR|WARN|INFO|DEBUG|TRACE"
    )]
    log_level: Level,

    /// Name of the product to download files for, as listed in the catalog
    #[arg(required_unless_present = "list_products")]
    product: Option<String>,
}

impl Arguments {
    /// Build the set of filters requested on the command line.  `today` is
    /// used as the end of the date range when `--end-date` is not given.
    fn filter_spec(&self, today: Date) -> Result<FilterSpec, FilterSpecError> {
        let mut predicates = Vec::new();
        if let Some(start) = self.start_date {
            let end = self.end_date.unwrap_or(today);
            predicates.push(Predicate::DateRange(DateRange::new(start, end)?));
        }
        if let Some(ref text) = self.search {
            predicates.push(Predicate::substring(text)?);
        }
        if let Some(ref names) = self.names {
            predicates.push(Predicate::ExactNames(names.parse()?));
        }
        if self.all {
            predicates.push(Predicate::AllFiles);
        }
        FilterSpec::new(predicates, self.file_type.iter().collect::<FileTypeSet>())
    }

    /// Resolve everything about the run that doesn't require talking to AWS
    fn request(&self, product: &ProductConfig, now: OffsetDateTime) -> anyhow::Result<Request> {
        let filter = self.filter_spec(now.date())?;
        let family = product.family();
        let (location, path_was_explicit) = match self.s3_path {
            Some(ref loc) => (loc.clone(), true),
            None => (product.location(), false),
        };
        let outdir = match self.outdir {
            Some(ref p) => p.clone(),
            None => default_outdir(&family, now)
                .context("failed to format output directory name")?,
        };
        Ok(Request {
            location,
            path_was_explicit,
            family,
            filter,
            outdir,
            dry_run: self.dry_run,
        })
    }

    fn credential_source(&self) -> CredentialSource {
        match self.credential_command {
            Some(ref program) => CredentialSource::Command(CommandProvider::new(
                program.clone(),
                self.credential_arg.clone(),
            )),
            None => CredentialSource::Profile(ProfileProvider::new(self.profile.clone())),
        }
    }

    fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
        }
    }
}

// See
// <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/time/struct.OffsetTime.html#method.local_rfc_3339>
// for an explanation of the main + #[tokio::main]run thing
fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    let timer =
        OffsetTime::local_rfc_3339().context("failed to determine local timezone offset")?;
    let now = OffsetDateTime::now_local().context("failed to determine local time")?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(stderr().is_terminal())
                .with_writer(stderr),
        )
        .with(
            Targets::new()
                .with_target(env!("CARGO_CRATE_NAME"), args.log_level)
                .with_target("aws_config", Level::DEBUG.min(args.log_level))
                .with_default(Level::INFO.min(args.log_level)),
        )
        .init();
    run(args, now)
}

#[tokio::main]
async fn run(args: Arguments, now: OffsetDateTime) -> anyhow::Result<()> {
    let catalog = ProductCatalog::load(&args.config).with_context(|| {
        format!(
            "failed to load product catalog from {}",
            args.config.display()
        )
    })?;
    if args.list_products {
        for product in catalog.iter() {
            println!("{}", product.name);
        }
        return Ok(());
    }
    let Some(ref name) = args.product else {
        anyhow::bail!("missing required PRODUCT argument");
    };
    let product = catalog.get(name)?;
    let request = args.request(product, now)?;
    for pred in request.filter.predicates() {
        tracing::debug!(filter = %pred, "Using filter");
    }
    if !request.filter.file_types().is_empty() {
        tracing::debug!(file_types = ?request.filter.file_types(), "Restricting file types");
    }

    tracing::info!(
        product = %product.name,
        account_id = %product.account_id,
        "Fetching credentials ..."
    );
    let credentials = fetch_with_timeout(
        &args.credential_source(),
        &product.account_id,
        Duration::from_secs(args.credential_timeout),
    )
    .await
    .context("failed to fetch credentials")?;
    tracing::info!("Credentials fetched successfully");

    let client = S3Client::new(&args.client_settings(), credentials).await;
    match fetch::execute(&client, &request).await? {
        Outcome::Downloaded { count } => {
            tracing::info!(count, outdir = %request.outdir.display(), "Download completed");
        }
        Outcome::Listed { keys } => {
            for key in keys {
                println!("{key}");
            }
        }
        Outcome::NoMatches => tracing::warn!("No files found for the selected criteria"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::{date, datetime};

    fn parse(args: &[&str]) -> Arguments {
        Arguments::try_parse_from(std::iter::once("s3prodfetch").chain(args.iter().copied()))
            .unwrap()
    }

    fn product() -> ProductConfig {
        ProductConfig {
            name: "NF Weekly".into(),
            account_id: "210987654321".into(),
            bucket: "nf-drop".into(),
            folder_path: "exports/".into(),
        }
    }

    #[test]
    fn no_filter_rejected() {
        let args = parse(&["NF Weekly", "-t", "txt"]);
        assert_eq!(
            args.filter_spec(date!(2024 - 03 - 15)),
            Err(FilterSpecError::NoPredicate)
        );
    }

    #[test]
    fn end_date_defaults_to_today() {
        let args = parse(&["NF Weekly", "--start-date", "2024-03-01"]);
        let spec = args.filter_spec(date!(2024 - 03 - 15)).unwrap();
        assert_eq!(
            spec.predicates(),
            [Predicate::DateRange(
                DateRange::new(date!(2024 - 03 - 01), date!(2024 - 03 - 15)).unwrap()
            )]
        );
    }

    #[test]
    fn end_date_requires_start_date() {
        assert!(
            Arguments::try_parse_from(["s3prodfetch", "CP", "--end-date", "2024-03-01"]).is_err()
        );
    }

    #[test]
    fn bad_date_rejected() {
        assert!(
            Arguments::try_parse_from(["s3prodfetch", "CP", "--start-date", "20240301"]).is_err()
        );
    }

    #[test]
    fn combined_filters() {
        let args = parse(&[
            "NF Weekly",
            "--start-date",
            "2024-03-01",
            "--end-date",
            "2024-03-31",
            "--search",
            "batch",
            "--names",
            "a, b.txt",
            "--all",
            "-t",
            "txt,json",
            "-t",
            "csv",
        ]);
        let spec = args.filter_spec(date!(2024 - 04 - 01)).unwrap();
        assert_eq!(spec.predicates().len(), 4);
        assert_eq!(
            spec.file_types(),
            &["csv", "json", "txt"].into_iter().collect::<FileTypeSet>()
        );
    }

    #[test]
    fn blank_search_rejected() {
        let args = parse(&["NF Weekly", "--search", "  "]);
        assert_eq!(
            args.filter_spec(date!(2024 - 03 - 15)),
            Err(FilterSpecError::EmptySearch)
        );
    }

    #[test]
    fn request_uses_catalog_location() {
        let args = parse(&["NF Weekly", "--all"]);
        let req = args
            .request(&product(), datetime!(2024-03-15 09:05:07 UTC))
            .unwrap();
        assert_eq!(req.location.to_string(), "s3://nf-drop/exports/");
        assert!(!req.path_was_explicit);
        assert_eq!(req.outdir, PathBuf::from("NF_20240315_090507"));
    }

    #[test]
    fn request_with_explicit_path() {
        let args = parse(&[
            "NF Weekly",
            "--all",
            "--s3-path",
            "s3://other-drop/adhoc/",
            "-o",
            "here",
        ]);
        let req = args
            .request(&product(), datetime!(2024-03-15 09:05:07 UTC))
            .unwrap();
        assert_eq!(req.location.to_string(), "s3://other-drop/adhoc/");
        assert!(req.path_was_explicit);
        assert_eq!(req.outdir, PathBuf::from("here"));
    }

    #[test]
    fn credential_source_selection() {
        let args = parse(&["CP", "--all", "--profile", "cp-sso"]);
        assert_eq!(
            args.credential_source(),
            CredentialSource::Profile(ProfileProvider::new(Some("cp-sso".into())))
        );
        let args = parse(&[
            "CP",
            "--all",
            "--credential-command",
            "sso-helper",
            "--credential-arg",
            "--portal=https://example.awsapps.com/start",
        ]);
        assert_matches!(args.credential_source(), CredentialSource::Command(_));
    }

    #[test]
    fn list_products_needs_no_product() {
        let args = parse(&["--list-products"]);
        assert!(args.list_products);
        assert_eq!(args.product, None);
        assert!(Arguments::try_parse_from(["s3prodfetch", "--all"]).is_err());
    }
}
