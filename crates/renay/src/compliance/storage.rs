//! Object key layout and signed download URLs for AVS files.
//!
//! A signed URL has the shape `{base_url}/{key}?expires={unix_secs}&signature={hex}` where the
//! signature is HMAC-SHA256 over `"{key}\n{expires}"`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::domain::SubcontractorId;

type HmacSha256 = Hmac<Sha256>;

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 8;

/// Storage key for a freshly uploaded file: `avs/{subcontractor}/{random}.{ext}`.
pub fn object_key(subcontractor_id: SubcontractorId, filename: &str) -> String {
    format!(
        "avs/{}/{}.{}",
        subcontractor_id,
        Uuid::new_v4(),
        file_extension(filename)
    )
}

fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Content type from the request header, or guessed from the filename.
pub fn content_type_for(filename: &str, declared: Option<&str>) -> mime::Mime {
    declared
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .unwrap_or_else(|| mime_guess::from_path(filename).first_or_octet_stream())
}

/// Keys are relative, slash separated, and never climb out of the bucket.
pub fn validate_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signed url has expired")]
    Expired,
    #[error("signature does not match")]
    Mismatch,
}

/// Issues and checks HMAC signed download URLs.
#[derive(Clone)]
pub struct UrlSigner {
    base_url: String,
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(base_url: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn sign(&self, key: &str, now: DateTime<Utc>, ttl: Duration) -> String {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = now.timestamp().saturating_add(ttl_secs);
        format!(
            "{}/{}?expires={}&signature={}",
            self.base_url,
            key,
            expires,
            self.signature(key, expires)
        )
    }

    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let provided = hex::decode(signature).map_err(|_| SignatureError::Mismatch)?;
        self.mac(key, expires)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::Mismatch)?;

        if now.timestamp() > expires {
            return Err(SignatureError::Expired);
        }

        Ok(())
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split_once('?')
            .map(|(_, query)| query)
            .unwrap_or_default()
            .split('&')
            .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
            .expect("query parameter present")
    }

    #[test]
    fn object_keys_are_scoped_by_subcontractor() {
        let sub = SubcontractorId::new();
        let key = object_key(sub, "Haftpflicht 2026.PDF");

        assert!(key.starts_with(&format!("avs/{sub}/")));
        assert!(key.ends_with(".pdf"));
        assert!(validate_key(&key));
        assert_ne!(key, object_key(sub, "Haftpflicht 2026.PDF"));
    }

    #[test]
    fn odd_filenames_fall_back_to_bin() {
        assert_eq!(file_extension("scan"), "bin");
        assert_eq!(file_extension("scan."), "bin");
        assert_eq!(file_extension("scan.p/df"), "bin");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
    }

    #[test]
    fn content_type_prefers_declared_header() {
        assert_eq!(
            content_type_for("cert.pdf", Some("image/png")),
            mime::IMAGE_PNG
        );
        assert_eq!(content_type_for("cert.pdf", None), mime::APPLICATION_PDF);
        assert_eq!(
            content_type_for("cert", Some("not a mime")),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[test]
    fn rejects_traversal_keys() {
        assert!(!validate_key(""));
        assert!(!validate_key("/avs/x.pdf"));
        assert!(!validate_key("avs/../secrets"));
        assert!(!validate_key("avs//x.pdf"));
        assert!(validate_key("avs/sub/doc.pdf"));
    }

    #[test]
    fn signed_url_round_trips_until_expiry() {
        let signer = UrlSigner::new("https://files.example.com/", "secret");
        let url = signer.sign("avs/sub/doc.pdf", now(), Duration::from_secs(3600));

        assert!(url.starts_with("https://files.example.com/avs/sub/doc.pdf?expires="));
        let expires: i64 = query_param(&url, "expires").parse().expect("numeric expiry");
        let signature = query_param(&url, "signature");
        assert_eq!(expires, now().timestamp() + 3600);

        assert_eq!(signer.verify("avs/sub/doc.pdf", expires, signature, now()), Ok(()));
        assert_eq!(
            signer.verify("avs/sub/other.pdf", expires, signature, now()),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            signer.verify("avs/sub/doc.pdf", expires + 1, signature, now()),
            Err(SignatureError::Mismatch)
        );

        let later = now() + chrono::Duration::seconds(3601);
        assert_eq!(
            signer.verify("avs/sub/doc.pdf", expires, signature, later),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn different_secrets_do_not_verify() {
        let issuer = UrlSigner::new("http://localhost/files", "one");
        let checker = UrlSigner::new("http://localhost/files", "two");
        let url = issuer.sign("avs/a/b.png", now(), Duration::from_secs(60));
        let expires: i64 = query_param(&url, "expires").parse().expect("numeric expiry");

        assert_eq!(
            checker.verify("avs/a/b.png", expires, query_param(&url, "signature"), now()),
            Err(SignatureError::Mismatch)
        );
    }
}
