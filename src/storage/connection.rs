//! Azure Storage connection string parsing.
//!
//! Recognised keys (case-insensitive): `DefaultEndpointsProtocol`,
//! `AccountName`, `AccountKey`, `EndpointSuffix`, `BlobEndpoint`,
//! `SharedAccessSignature` and `UseDevelopmentStorage`.
use secrecy::SecretString;
use std::{collections::HashMap, str::FromStr};
use url::Url;

use crate::{Result, error::ReleaseNotesError};

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Well known account for the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";
/// Well known key for the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_KEY: &str = "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzF\
    T50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVELOPMENT_BLOB_ENDPOINT: &str =
    "http://127.0.0.1:10000/devstoreaccount1";

/// How requests against the account are authorized.
#[derive(Debug, Clone)]
pub enum StorageCredentials {
    /// Account name and base64 encoded account key for Shared Key signing.
    SharedKey { account: String, key: SecretString },
    /// Pre-signed SAS query string appended to every request.
    SharedAccessSignature(SecretString),
}

/// Parsed storage connection string.
#[derive(Debug, Clone)]
pub struct ConnectionString {
    pub blob_endpoint: Url,
    pub credentials: StorageCredentials,
}

impl FromStr for ConnectionString {
    type Err = ReleaseNotesError;

    fn from_str(value: &str) -> Result<Self> {
        let pairs = parse_pairs(value)?;

        if pairs
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self {
                blob_endpoint: Url::parse(DEVELOPMENT_BLOB_ENDPOINT)?,
                credentials: StorageCredentials::SharedKey {
                    account: DEVELOPMENT_ACCOUNT_NAME.into(),
                    key: SecretString::from(
                        DEVELOPMENT_ACCOUNT_KEY.to_string(),
                    ),
                },
            });
        }

        let account = pairs.get("accountname").cloned();

        let blob_endpoint = match pairs.get("blobendpoint") {
            Some(endpoint) => Url::parse(endpoint)?,
            None => {
                let account = account.as_deref().ok_or_else(|| {
                    ReleaseNotesError::invalid_config(
                        "connection string needs AccountName or BlobEndpoint",
                    )
                })?;
                let protocol = pairs
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL);
                let suffix = pairs
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                Url::parse(&format!("{protocol}://{account}.blob.{suffix}"))?
            }
        };

        let credentials = if let Some(sas) = pairs.get("sharedaccesssignature")
        {
            StorageCredentials::SharedAccessSignature(SecretString::from(
                sas.trim_start_matches('?').to_string(),
            ))
        } else {
            match (account, pairs.get("accountkey")) {
                (Some(account), Some(key)) => StorageCredentials::SharedKey {
                    account,
                    key: SecretString::from(key.clone()),
                },
                _ => {
                    return Err(ReleaseNotesError::invalid_config(
                        "connection string needs AccountName and AccountKey \
                         or a SharedAccessSignature",
                    ));
                }
            }
        };

        Ok(Self {
            blob_endpoint,
            credentials,
        })
    }
}
