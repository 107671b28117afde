//! AWS SigV4 presigned URL generation
//!
//! Generates pre-signed GET and PUT URLs for S3-compatible object storage.
//! Signing is a local computation over already-loaded credentials; nothing
//! here touches the network.
//!
//! Reference: https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-query-string-auth.html

use crate::error::SigningError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Longest expiry SigV4 allows for a presigned URL (7 days)
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const SERVICE: &str = "s3";

/// Percent-encode a string for use in a URL query string value or path segment.
/// Leaves unreserved characters (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) unchanged.
fn uri_encode(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(HEX[usize::from(b >> 4)] as char);
                out.push(HEX[usize::from(b & 0xf)] as char);
            }
        }
    }
    out
}

/// Canonical header value: surrounding whitespace removed, inner runs collapsed to one space
fn trim_all(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Where the bucket name goes in the URL
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AddressingStyle {
    /// `https://endpoint/bucket/key`
    #[default]
    Path,
    /// `https://bucket.endpoint/key`
    VirtualHosted,
}

/// One request to presign
#[derive(Debug, Clone)]
pub struct PresignRequest<'a> {
    /// HTTP method the URL will be used with
    pub method: &'a str,
    pub bucket: &'a str,
    pub key: &'a str,
    pub expires_in: Duration,
    /// Headers (other than `host`) the caller must send verbatim
    pub signed_headers: BTreeMap<String, String>,
}

impl<'a> PresignRequest<'a> {
    /// Presign a plain GET of an object
    #[must_use]
    pub fn get(bucket: &'a str, key: &'a str, expires_in: Duration) -> Self {
        Self {
            method: "GET",
            bucket,
            key,
            expires_in,
            signed_headers: BTreeMap::new(),
        }
    }

    /// Presign a PUT of an object with a fixed `Content-Type`
    #[must_use]
    pub fn put(bucket: &'a str, key: &'a str, content_type: &str, expires_in: Duration) -> Self {
        let mut signed_headers = BTreeMap::new();
        signed_headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            method: "PUT",
            bucket,
            key,
            expires_in,
            signed_headers,
        }
    }
}

/// SigV4 query-string signer bound to one set of storage credentials
pub struct Presigner {
    endpoint: String,
    region: String,
    access_key_id: String,
    secret_access_key: SecretString,
    style: AddressingStyle,
}

impl std::fmt::Debug for Presigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presigner")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl Presigner {
    /// Create a signer for `endpoint` (e.g. `https://<account>.r2.cloudflarestorage.com`)
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: SecretString,
    ) -> Result<Self, SigningError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(SigningError::InvalidEndpoint(endpoint));
        }
        Ok(Self {
            endpoint,
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key,
            style: AddressingStyle::Path,
        })
    }

    /// Set the addressing style
    #[must_use]
    pub const fn with_addressing_style(mut self, style: AddressingStyle) -> Self {
        self.style = style;
        self
    }

    /// Presign `request` as of now
    pub fn presign(&self, request: &PresignRequest<'_>) -> Result<String, SigningError> {
        self.presign_at(request, Utc::now())
    }

    /// Presign `request` as of `now`
    ///
    /// The returned URL is valid from `now` for `request.expires_in`.
    pub fn presign_at(
        &self,
        request: &PresignRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        if request.expires_in.is_zero() || request.expires_in > MAX_PRESIGN_EXPIRY {
            return Err(SigningError::InvalidExpiry(request.expires_in.as_secs()));
        }

        let date_str = now.format("%Y%m%d").to_string();
        let datetime_str = now.format("%Y%m%dT%H%M%SZ").to_string();
        let expires_secs = request.expires_in.as_secs();

        let credential_scope = format!("{date_str}/{}/{SERVICE}/aws4_request", self.region);
        let credential = format!("{}/{credential_scope}", self.access_key_id);

        let (scheme, endpoint_host) = self
            .endpoint
            .split_once("://")
            .ok_or_else(|| SigningError::InvalidEndpoint(self.endpoint.clone()))?;

        let encoded_key = request
            .key
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/");
        let (host, canonical_uri) = match self.style {
            AddressingStyle::Path => (
                endpoint_host.to_string(),
                format!("/{}/{encoded_key}", uri_encode(request.bucket)),
            ),
            AddressingStyle::VirtualHosted => (
                format!("{}.{endpoint_host}", request.bucket),
                format!("/{encoded_key}"),
            ),
        };

        // Canonical headers are sorted by lower-cased name; host is always signed
        let mut headers: BTreeMap<String, String> = request
            .signed_headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), trim_all(value)))
            .collect();
        headers.insert("host".to_string(), host.clone());

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

        // Canonical query string (parameters must be sorted)
        let canonical_qs = format!(
            "X-Amz-Algorithm=AWS4-HMAC-SHA256\
             &X-Amz-Credential={cred}\
             &X-Amz-Date={dt}\
             &X-Amz-Expires={exp}\
             &X-Amz-SignedHeaders={signed}",
            cred = uri_encode(&credential),
            dt = datetime_str,
            exp = expires_secs,
            signed = uri_encode(&signed_headers),
        );

        // Canonical request (payload is UNSIGNED for presigned URLs)
        let canonical_request = format!(
            "{method}\n{uri}\n{qs}\n{headers}\n{signed}\nUNSIGNED-PAYLOAD",
            method = request.method,
            uri = canonical_uri,
            qs = canonical_qs,
            headers = canonical_headers,
            signed = signed_headers,
        );

        let cr_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{dt}\n{scope}\n{hash}",
            dt = datetime_str,
            scope = credential_scope,
            hash = cr_hash,
        );

        let signing_key = derive_signing_key(
            self.secret_access_key.expose_secret(),
            &date_str,
            &self.region,
            SERVICE,
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{scheme}://{host}{canonical_uri}?{canonical_qs}&X-Amz-Signature={signature}"
        ))
    }
}

/// Derive the SigV4 signing key from the secret access key and scope components.
fn derive_signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SigningError::Internal(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
