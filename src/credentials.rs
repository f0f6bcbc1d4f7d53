//! Obtaining temporary AWS credentials for a product's account
use aws_config::BehaviorVersion;
use aws_credential_types::{
    provider::{error::CredentialsError, ProvideCredentials},
    Credentials,
};
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::process::Command;

/// A source of credentials for AWS accounts identified by account ID
pub(crate) trait CredentialProvider: Send + Sync {
    fn fetch(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<Credentials, CredentialError>> + Send;
}

/// Fetch credentials for `account_id` from `provider`, giving up once
/// `timeout` has elapsed
pub(crate) async fn fetch_with_timeout<P: CredentialProvider>(
    provider: &P,
    account_id: &str,
    timeout: Duration,
) -> Result<Credentials, CredentialError> {
    match tokio::time::timeout(timeout, provider.fetch(account_id)).await {
        Ok(r) => r,
        Err(_) => Err(CredentialError::Timeout {
            account_id: account_id.to_owned(),
            timeout,
        }),
    }
}

/// Obtains credentials by running an external helper program with the
/// account ID as its final argument.
///
/// The helper must print a JSON object to stdout in the format used by the
/// AWS CLI's `credential_process` setting:
///
/// ```json
/// {
///     "Version": 1,
///     "AccessKeyId": "...",
///     "SecretAccessKey": "...",
///     "SessionToken": "...",
///     "Expiration": "2024-03-15T12:00:00Z"
/// }
/// ```
///
/// `SessionToken` and `Expiration` are optional.  The helper is killed if the
/// fetch is abandoned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CommandProvider {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandProvider {
    pub(crate) fn new(program: PathBuf, args: Vec<String>) -> CommandProvider {
        CommandProvider { program, args }
    }
}

impl CredentialProvider for CommandProvider {
    async fn fetch(&self, account_id: &str) -> Result<Credentials, CredentialError> {
        tracing::debug!(program = %self.program.display(), account_id, "Running credential helper");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(account_id)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CredentialError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(CredentialError::HelperFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        let parsed = serde_json::from_slice::<HelperOutput>(&output.stdout).map_err(|source| {
            CredentialError::Parse {
                program: self.program.clone(),
                source,
            }
        })?;
        parsed.into_credentials()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct HelperOutput {
    version: u32,
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    expiration: Option<OffsetDateTime>,
}

impl HelperOutput {
    fn into_credentials(self) -> Result<Credentials, CredentialError> {
        if self.version != 1 {
            return Err(CredentialError::UnsupportedVersion(self.version));
        }
        Ok(Credentials::new(
            self.access_key_id,
            self.secret_access_key,
            self.session_token,
            self.expiration.map(Into::into),
            "credential-command",
        ))
    }
}

/// Obtains credentials through the AWS SDK's default provider chain
/// (environment variables, shared config & credentials files, SSO
/// profiles, etc.), optionally using a specific named profile.
///
/// The account ID is not used to select credentials; the profile must
/// already be set up for the right account.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ProfileProvider {
    profile: Option<String>,
}

impl ProfileProvider {
    pub(crate) fn new(profile: Option<String>) -> ProfileProvider {
        ProfileProvider { profile }
    }
}

impl CredentialProvider for ProfileProvider {
    async fn fetch(&self, account_id: &str) -> Result<Credentials, CredentialError> {
        tracing::debug!(
            account_id,
            profile = self.profile.as_deref(),
            "Resolving credentials through AWS provider chain"
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref profile) = self.profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        let Some(provider) = config.credentials_provider() else {
            return Err(CredentialError::NoProvider);
        };
        provider
            .provide_credentials()
            .await
            .map_err(CredentialError::Provider)
    }
}

/// The credential provider selected on the command line
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum CredentialSource {
    Command(CommandProvider),
    Profile(ProfileProvider),
}

impl CredentialProvider for CredentialSource {
    async fn fetch(&self, account_id: &str) -> Result<Credentials, CredentialError> {
        match self {
            CredentialSource::Command(p) => p.fetch(account_id).await,
            CredentialSource::Profile(p) => p.fetch(account_id).await,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum CredentialError {
    #[error("timed out after {timeout:?} waiting for credentials for account {account_id}")]
    Timeout {
        account_id: String,
        timeout: Duration,
    },
    #[error("failed to run credential helper {}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("credential helper {} failed ({status}): {stderr}", program.display())]
    HelperFailed {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
    #[error("failed to parse output of credential helper {}", program.display())]
    Parse {
        program: PathBuf,
        source: serde_json::Error,
    },
    #[error("credential helper output has unsupported version {0}; expected 1")]
    UnsupportedVersion(u32),
    #[error("no AWS credentials provider is configured")]
    NoProvider,
    #[error("AWS credentials provider failed")]
    Provider(#[source] CredentialsError),
}
