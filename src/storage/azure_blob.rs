//! Implements DocumentStore for Azure Blob Storage
use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use reqwest::{
    Client, Method, Request, Response, StatusCode, Url,
    header::{
        AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, IF_NONE_MATCH,
    },
};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;

use crate::{
    Result,
    config::WriteMode,
    error::ReleaseNotesError,
    storage::{
        connection::{ConnectionString, StorageCredentials},
        traits::{Document, DocumentStore},
    },
};

type HmacSha256 = Hmac<Sha256>;

/// Blob service REST version sent with every request.
pub const STORAGE_API_VERSION: &str = "2021-08-06";
const DOCUMENT_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Headers that take part in the Shared Key string-to-sign, in order.
const SIGNED_STANDARD_HEADERS: [&str; 10] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
];

/// Azure Blob Storage client using reqwest for container and blob
/// operations.
pub struct AzureBlobStore {
    client: Client,
    endpoint: Url,
    credentials: StorageCredentials,
}

impl AzureBlobStore {
    pub fn new(
        connection: &ConnectionString,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: connection.blob_endpoint.clone(),
            credentials: connection.credentials.clone(),
        })
    }

    fn resource_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();

        url.path_segments_mut()
            .map_err(|_| {
                ReleaseNotesError::invalid_config(format!(
                    "blob endpoint cannot be used as a base: {}",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Build a request with the storage version/date headers and
    /// authorization applied.
    fn request(
        &self,
        method: Method,
        mut url: Url,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<Request> {
        if let StorageCredentials::SharedAccessSignature(sas) =
            &self.credentials
        {
            let query = match url.query() {
                Some(existing) => {
                    format!("{existing}&{}", sas.expose_secret())
                }
                None => sas.expose_secret().to_string(),
            };
            url.set_query(Some(&query));
        }

        let mut builder = self
            .client
            .request(method, url)
            .headers(headers)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", http_date(Utc::now()));

        if let Some(body) = body {
            builder = builder.body(body);
        }

        let mut request = builder.build()?;

        if let StorageCredentials::SharedKey { account, key } =
            &self.credentials
        {
            let authorization =
                shared_key_authorization(account, key, &request)?;
            request.headers_mut().insert(AUTHORIZATION, authorization);
        }

        Ok(request)
    }

    async fn create_append_blob(&self, url: &Url) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers
            .insert("x-ms-blob-type", HeaderValue::from_static("AppendBlob"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(DOCUMENT_CONTENT_TYPE),
        );
        // only create when absent so existing content is kept
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("*"));

        let request =
            self.request(Method::PUT, url.clone(), headers, Some(vec![]))?;
        let response = self.client.execute(request).await?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                debug!("append blob already exists: {url}");
                Ok(())
            }
            _ => {
                check_status(response)?;
                Ok(())
            }
        }
    }

    async fn append_block(&self, url: &Url, content: &str) -> Result<()> {
        let mut url = url.clone();
        url.query_pairs_mut().append_pair("comp", "appendblock");

        let request = self.request(
            Method::PUT,
            url,
            HeaderMap::new(),
            Some(content.as_bytes().to_vec()),
        )?;
        let response = self.client.execute(request).await?;
        check_status(response)?;
        Ok(())
    }

    async fn put_block_blob(&self, url: &Url, content: &str) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(DOCUMENT_CONTENT_TYPE),
        );

        let request = self.request(
            Method::PUT,
            url.clone(),
            headers,
            Some(content.as_bytes().to_vec()),
        )?;
        let response = self.client.execute(request).await?;
        check_status(response)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for AzureBlobStore {
    async fn ensure_container(&self, container: &str) -> Result<()> {
        let mut url = self.resource_url(&[container])?;
        url.query_pairs_mut().append_pair("restype", "container");

        let request =
            self.request(Method::PUT, url, HeaderMap::new(), Some(vec![]))?;
        let response = self.client.execute(request).await?;

        if response.status() == StatusCode::CONFLICT {
            debug!("container already exists: {container}");
            return Ok(());
        }

        check_status(response)?;
        info!("created container: {container}");
        Ok(())
    }

    async fn write(&self, document: &Document, mode: WriteMode) -> Result<()> {
        let url = self.resource_url(&[
            document.container.as_str(),
            document.name.as_str(),
        ])?;

        match mode {
            WriteMode::Overwrite => {
                self.put_block_blob(&url, &document.content).await?
            }
            WriteMode::Append => {
                self.create_append_blob(&url).await?;
                self.append_block(&url, &document.content).await?;
            }
        }

        info!(
            "wrote {} bytes to blob {}/{}",
            document.content.len(),
            document.container,
            document.name
        );

        Ok(())
    }
}

/// Status failures other than authorization and throttling are storage
/// errors.
fn check_status(response: Response) -> Result<Response> {
    response.error_for_status().map_err(|err| {
        match ReleaseNotesError::from(err) {
            ReleaseNotesError::NetworkError(msg) => {
                ReleaseNotesError::storage(msg)
            }
            other => other,
        }
    })
}

/// RFC 1123 date as required by the `x-ms-date` header.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn shared_key_authorization(
    account: &str,
    key: &SecretString,
    request: &Request,
) -> Result<HeaderValue> {
    let content_length = request
        .body()
        .and_then(|b| b.as_bytes())
        .map(|b| b.len())
        .unwrap_or(0);

    let to_sign = string_to_sign(
        account,
        request.method(),
        request.url(),
        request.headers(),
        content_length,
    );

    let signature = sign(key, &to_sign)?;

    let mut value =
        HeaderValue::from_str(&format!("SharedKey {account}:{signature}"))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Shared Key string-to-sign for the blob service.
pub fn string_to_sign(
    account: &str,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    content_length: usize,
) -> String {
    let mut parts = vec![method.as_str().to_string()];

    for name in SIGNED_STANDARD_HEADERS {
        let value = if name == "content-length" {
            // zero length is signed as an empty string
            if content_length == 0 {
                String::new()
            } else {
                content_length.to_string()
            }
        } else {
            header_str(headers, name)
        };
        parts.push(value);
    }

    // Range
    parts.push(header_str(headers, "range"));

    let mut signed = parts.join("\n");
    signed.push('\n');
    signed.push_str(&canonicalized_headers(headers));
    signed.push_str(&canonicalized_resource(account, url));
    signed
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms_headers = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().trim().to_string(),
            )
        })
        .collect::<Vec<(String, String)>>();

    ms_headers.sort();

    ms_headers
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{account}{}", url.path());

    let mut params: Vec<(String, Vec<String>)> = vec![];

    for (name, value) in url.query_pairs() {
        let name = name.to_lowercase();
        match params.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value.to_string()),
            None => params.push((name, vec![value.to_string()])),
        }
    }

    params.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{name}:{}", values.join(",")));
    }

    resource
}

fn sign(key: &SecretString, to_sign: &str) -> Result<String> {
    let decoded = BASE64_STANDARD.decode(key.expose_secret())?;

    let mut mac = HmacSha256::new_from_slice(&decoded).map_err(|e| {
        ReleaseNotesError::invalid_config(format!("invalid account key: {e}"))
    })?;
    mac.update(to_sign.as_bytes());

    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}
