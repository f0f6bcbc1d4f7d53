mod location;
pub(crate) use self::location::*;
use crate::consts::DEFAULT_REGION;
use crate::objectkey::ObjectKey;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    operation::{get_object::GetObjectError, list_objects_v2::ListObjectsV2Error},
    primitives::ByteStreamError,
    Client,
};
use aws_smithy_runtime_api::client::{orchestrator::HttpResponse, result::SdkError};
use std::fs::File;
use std::future::Future;
use std::io::{BufWriter, Write};
use thiserror::Error;

/// Remote storage from which objects are listed & downloaded
pub(crate) trait ObjectStore: Send + Sync {
    /// Return the keys of all objects in `location`'s bucket that begin with
    /// `location`'s key, across all pages of results, in listing order
    fn list_keys(
        &self,
        location: &S3Location,
    ) -> impl Future<Output = Result<Vec<ObjectKey>, ListObjectsError>> + Send;

    /// Write the contents of the object at `location` to `outfile`
    fn download_object(
        &self,
        location: &S3Location,
        outfile: &File,
    ) -> impl Future<Output = Result<(), DownloadError>> + Send;
}

/// Settings for connecting to S3
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ClientSettings {
    /// Region to connect to; if unset, the region is taken from the
    /// environment, falling back to [`DEFAULT_REGION`]
    pub(crate) region: Option<String>,

    /// Alternative endpoint, e.g. for S3-compatible storage.  Setting this
    /// also enables path-style addressing.
    pub(crate) endpoint_url: Option<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct S3Client {
    inner: Client,
}

impl S3Client {
    pub(crate) async fn new(settings: &ClientSettings, credentials: Credentials) -> S3Client {
        let region = RegionProviderChain::first_try(settings.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static(DEFAULT_REGION));
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials);
        if let Some(ref url) = settings.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&config);
        if settings.endpoint_url.is_some() {
            builder = builder.force_path_style(true);
        }
        tracing::debug!(region = ?config.region(), "Configured S3 client");
        S3Client {
            inner: Client::from_conf(builder.build()),
        }
    }
}

impl ObjectStore for S3Client {
    async fn list_keys(&self, location: &S3Location) -> Result<Vec<ObjectKey>, ListObjectsError> {
        let mut pages = self
            .inner
            .list_objects_v2()
            .bucket(location.bucket())
            .prefix(location.key())
            .into_paginator()
            .send();
        let mut keys = Vec::new();
        let mut page_count = 0usize;
        while let Some(r) = pages.next().await {
            let page = r.map_err(|source| ListObjectsError {
                bucket: location.bucket().to_owned(),
                prefix: location.key().to_owned(),
                source,
            })?;
            page_count += 1;
            keys.extend(
                page.contents
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|obj| obj.key)
                    .map(ObjectKey::from),
            );
            tracing::trace!(page = page_count, keys_so_far = keys.len(), "Received listing page");
        }
        Ok(keys)
    }

    async fn download_object(
        &self,
        location: &S3Location,
        outfile: &File,
    ) -> Result<(), DownloadError> {
        tracing::trace!(url = %location, "Requesting object");
        let obj = self
            .inner
            .get_object()
            .bucket(location.bucket())
            .key(location.key())
            .send()
            .await
            .map_err(|source| DownloadError::Get {
                url: location.clone(),
                source,
            })?;
        let mut body = obj.body;
        let mut writer = BufWriter::new(outfile);
        while let Some(blob) = body.try_next().await.map_err(|source| DownloadError::Read {
            url: location.clone(),
            source,
        })? {
            writer.write_all(&blob).map_err(|source| DownloadError::Write {
                url: location.clone(),
                source,
            })?;
        }
        writer.flush().map_err(|source| DownloadError::Write {
            url: location.clone(),
            source,
        })?;
        Ok(())
    }
}

type InnerListError = SdkError<ListObjectsV2Error, HttpResponse>;

#[derive(Debug, Error)]
#[error("failed to list S3 objects in bucket {bucket:?} with prefix {prefix:?}")]
pub(crate) struct ListObjectsError {
    bucket: String,
    prefix: String,
    source: InnerListError,
}

#[derive(Debug, Error)]
pub(crate) enum DownloadError {
    #[error("failed to request {url}")]
    Get {
        url: S3Location,
        source: SdkError<GetObjectError, HttpResponse>,
    },
    #[error("failed to read body of {url}")]
    Read {
        url: S3Location,
        source: ByteStreamError,
    },
    #[error("failed to write contents of {url} to disk")]
    Write {
        url: S3Location,
        source: std::io::Error,
    },
}
