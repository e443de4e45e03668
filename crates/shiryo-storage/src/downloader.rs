//! Streaming document downloader.
//!
//! Fetches a document URL into the blob store with size, type, and timeout
//! enforcement. Failures are per-file: the caller records them on the file
//! row and moves on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use shiryo_core::domain::{document_extension, sanitize_file_name, DOCUMENT_EXTENSIONS};
use shiryo_core::ports::{
    BlobStorePort, DownloadError, DownloadOutcome, DownloaderPort,
};

/// Settings for the downloader.
#[derive(Clone, Debug)]
pub struct DownloadConfig {
    /// Per-file byte cap; streaming aborts once it is exceeded.
    pub max_file_size: u64,
    /// TCP connect budget.
    pub connect_timeout: Duration,
    /// Whole-attempt budget, HEAD through blob put.
    pub total_timeout: Duration,
    /// GET attempts for transient failures, including the first.
    pub max_retries: u8,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            connect_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT: &str = "application/pdf,application/msword,\
                      application/vnd.openxmlformats-officedocument.wordprocessingml.document,*/*";

/// Downloads documents into a blob store.
pub struct Downloader {
    client: reqwest::Client,
    blob: Arc<dyn BlobStorePort>,
    config: DownloadConfig,
}

impl Downloader {
    /// Build a downloader over the given blob store.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(blob: Arc<dyn BlobStorePort>, config: DownloadConfig)
        -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        Ok(Self { client, blob, config })
    }

    async fn download_inner(
        &self,
        url: &str,
        key_prefix: &str,
        name_override: Option<&str>,
    ) -> Result<DownloadOutcome, DownloadError> {
        // HEAD first to reject oversized bodies cheaply; any HEAD failure
        // just falls through to the GET.
        if let Ok(response) = self
            .client
            .head(url)
            .header("Accept", ACCEPT)
            .send()
            .await
        {
            if response.status().is_success() {
                if let Some(length) = content_length(&response) {
                    if length > self.config.max_file_size {
                        return Err(DownloadError::Oversize {
                            size: length,
                            limit: self.config.max_file_size,
                        });
                    }
                }
            }
        }

        let response = self.get_with_retry(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http(status.as_u16()));
        }

        if let Some(length) = content_length(&response) {
            if length > self.config.max_file_size {
                return Err(DownloadError::Oversize {
                    size: length,
                    limit: self.config.max_file_size,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let extension = infer_extension(url, &content_type)?;
        let file_name = resolve_file_name(url, name_override, disposition.as_deref(), extension);

        // Stream the body, enforcing the cap as bytes arrive.
        let mut response = response;
        let mut body: Vec<u8> = Vec::new();
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| DownloadError::Network(e.to_string()))?;
            let Some(chunk) = chunk else { break };
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.config.max_file_size {
                return Err(DownloadError::Oversize {
                    size: body.len() as u64,
                    limit: self.config.max_file_size,
                });
            }
        }

        let stored_type = if content_type.is_empty() {
            mime_for_extension(extension).to_string()
        } else {
            content_type
        };
        let key = format!("{key_prefix}/{file_name}");
        let storage_key = self.blob.put(&key, &body, &stored_type).await?;

        tracing::info!(url, file = %file_name, size = body.len(), "downloaded document");
        Ok(DownloadOutcome {
            storage_key,
            file_name,
            size: body.len() as u64,
            content_type: stored_type,
        })
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let mut last_error: Option<DownloadError> = None;
        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500) * u32::from(attempt)).await;
            }
            match self
                .client
                .get(url)
                .header("Accept", ACCEPT)
                .header("Accept-Language", "ja,en;q=0.9,zh;q=0.8")
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt + 1 < self.config.max_retries {
                        last_error = Some(DownloadError::Http(status.as_u16()));
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(DownloadError::Network(e.to_string()));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DownloadError::Network("retries exhausted".into())))
    }
}

#[async_trait]
impl DownloaderPort for Downloader {
    async fn download(
        &self,
        url: &str,
        key_prefix: &str,
        name_override: Option<&str>,
    ) -> Result<DownloadOutcome, DownloadError> {
        let budget = self.config.total_timeout;
        tokio::time::timeout(budget, self.download_inner(url, key_prefix, name_override))
            .await
            .map_err(|_| DownloadError::Timeout(budget.as_secs()))?
    }
}

fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Extension inference: URL first, then Content-Type, then the `.pdf`
/// fallback for generic types. A concrete but unsupported MIME is an
/// error.
fn infer_extension(url: &str, content_type: &str) -> Result<&'static str, DownloadError> {
    if let Some(ext) = document_extension(url) {
        return Ok(ext);
    }
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if let Some(ext) = extension_for_mime(&essence) {
        return Ok(ext);
    }
    if essence.is_empty() || essence == "application/octet-stream" {
        return Ok("pdf");
    }
    Err(DownloadError::UnsupportedType(essence))
}

fn extension_for_mime(essence: &str) -> Option<&'static str> {
    match essence {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/vnd.ms-excel" => Some("xls"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        _ => None,
    }
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/pdf",
    }
}

/// Filename precedence: caller override, then Content-Disposition, then
/// the URL path basename, then a hash of the URL. The result is sanitized
/// and forced to end in the inferred extension.
fn resolve_file_name(
    url: &str,
    name_override: Option<&str>,
    disposition: Option<&str>,
    extension: &str,
) -> String {
    let candidate = name_override
        .map(str::to_string)
        .or_else(|| disposition.and_then(filename_from_disposition))
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| format!("{:x}", md5::compute(url.as_bytes()))[..16].to_string());

    let mut name = sanitize_file_name(&candidate);
    if name.is_empty() {
        name = format!("{:x}", md5::compute(url.as_bytes()))[..16].to_string();
    }
    let lower = name.to_ascii_lowercase();
    if !DOCUMENT_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
    {
        name.push('.');
        name.push_str(extension);
    }
    name
}

/// Pull a filename out of a Content-Disposition header, handling both
/// `filename="x.pdf"` and `filename*=UTF-8''x.pdf` forms.
fn filename_from_disposition(header: &str) -> Option<String> {
    for part in header.split(';') {
        let part = part.trim();
        let Some(value) = part
            .strip_prefix("filename*=")
            .map(|v| v.trim_start_matches("UTF-8''").trim_start_matches("utf-8''"))
            .or_else(|| part.strip_prefix("filename="))
        else {
            continue;
        };
        let value = value.trim_matches(['"', '\'']);
        if value.is_empty() {
            continue;
        }
        let decoded = urlencoding::decode(value)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| value.to_string());
        return Some(decoded);
    }
    None
}

/// The percent-decoded basename of the URL path, when it looks like a
/// file name.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let basename = parsed.path_segments()?.next_back()?;
    if basename.is_empty() || !basename.contains('.') {
        return None;
    }
    let decoded = urlencoding::decode(basename)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| basename.to_string());
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_url_over_content_type() {
        assert_eq!(
            infer_extension("http://u.example/yoko.docx", "application/pdf").unwrap(),
            "docx"
        );
    }

    #[test]
    fn extension_falls_back_to_content_type_then_pdf() {
        assert_eq!(
            infer_extension("http://u.example/download?id=3", "application/pdf").unwrap(),
            "pdf"
        );
        assert_eq!(
            infer_extension(
                "http://u.example/download?id=3",
                "application/vnd.ms-excel; charset=binary"
            )
            .unwrap(),
            "xls"
        );
        assert_eq!(
            infer_extension("http://u.example/download?id=3", "").unwrap(),
            "pdf"
        );
        assert_eq!(
            infer_extension("http://u.example/download?id=3", "application/octet-stream")
                .unwrap(),
            "pdf"
        );
    }

    #[test]
    fn unsupported_mime_is_an_error() {
        assert!(matches!(
            infer_extension("http://u.example/page", "text/html; charset=utf-8"),
            Err(DownloadError::UnsupportedType(t)) if t == "text/html"
        ));
    }

    #[test]
    fn disposition_filename_forms() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="yoko.pdf""#),
            Some("yoko.pdf".to_string())
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''%E8%A6%81%E9%A0%85.pdf"),
            Some("要項.pdf".to_string())
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn url_basename_extraction() {
        assert_eq!(
            filename_from_url("http://u.example/docs/yoko.pdf?v=2"),
            Some("yoko.pdf".to_string())
        );
        assert_eq!(
            filename_from_url("http://u.example/docs/%E8%A6%81%E9%A0%85.pdf"),
            Some("要項.pdf".to_string())
        );
        assert_eq!(filename_from_url("http://u.example/docs/"), None);
        assert_eq!(filename_from_url("http://u.example/download"), None);
    }

    #[test]
    fn file_name_precedence() {
        // Override wins
        assert_eq!(
            resolve_file_name(
                "http://u.example/a.pdf",
                Some("named.pdf"),
                Some(r#"attachment; filename="other.pdf""#),
                "pdf"
            ),
            "named.pdf"
        );
        // Then Content-Disposition
        assert_eq!(
            resolve_file_name(
                "http://u.example/a.pdf",
                None,
                Some(r#"attachment; filename="other.pdf""#),
                "pdf"
            ),
            "other.pdf"
        );
        // Then URL basename
        assert_eq!(
            resolve_file_name("http://u.example/a.pdf", None, None, "pdf"),
            "a.pdf"
        );
        // Then a URL hash, extension appended
        let hashed = resolve_file_name("http://u.example/download", None, None, "pdf");
        assert_eq!(hashed.len(), 16 + 4);
        assert!(hashed.ends_with(".pdf"));
    }

    #[test]
    fn file_name_is_forced_to_supported_extension() {
        assert_eq!(
            resolve_file_name("http://u.example/guide.php", None, None, "pdf"),
            "guide.php.pdf"
        );
        // Illegal characters are scrubbed
        assert_eq!(
            resolve_file_name("http://u.example/x", Some("a:b?c.pdf"), None, "pdf"),
            "a_b_c.pdf"
        );
    }
}
