//! Source retrieval over HTTP(S) and from the local filesystem.
//!
//! The [`Downloader`] trait keeps the network out of tests: the fetcher
//! depends on the trait and tests inject a mock.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for a single download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Retrieves the resource at a URL into a local file.
///
/// # Examples
///
/// ```
/// use lightning_packager::fetch::download::UrlDownloader;
///
/// let downloader = UrlDownloader;
/// // downloader.download("https://example.com/src.zip", dest) in production
/// # let _ = downloader;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Downloader {
    /// Download `url` and write its body to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be retrieved or written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from retrieving a resource.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The resource does not exist (HTTP 404 or missing local file).
    #[error("resource not found: {url}")]
    NotFound {
        /// The URL that could not be found.
        url: String,
    },

    /// The URL uses a scheme other than `http`, `https` or `file`.
    #[error("unsupported URL scheme in {url}")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloader handling `http://`, `https://` and `file://` URLs.
pub struct UrlDownloader;

impl Downloader for UrlDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        if let Some(local) = url.strip_prefix("file://") {
            return copy_local(url, Path::new(local), dest);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return download_to_file(url, dest);
        }
        Err(DownloadError::UnsupportedScheme {
            url: url.to_owned(),
        })
    }
}

/// Last path segment of `url`, ignoring any query string or fragment.
///
/// # Examples
///
/// ```
/// use lightning_packager::fetch::download::file_name_from_url;
///
/// assert_eq!(
///     file_name_from_url("https://github.com/o/r/archive/master.zip?x=1"),
///     Some("master.zip")
/// );
/// assert_eq!(file_name_from_url("https://example.com/"), None);
/// ```
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
}

fn copy_local(url: &str, source: &Path, dest: &Path) -> Result<(), DownloadError> {
    if !source.is_file() {
        return Err(DownloadError::NotFound {
            url: url.to_owned(),
        });
    }
    std::fs::copy(source, dest)?;
    Ok(())
}

/// Download a URL and write the body to a file.
fn download_to_file(url: &str, dest: &Path) -> Result<(), DownloadError> {
    let response = http_agent()
        .get(url)
        .call()
        .map_err(|e| map_ureq_error(url, &e))?;
    let mut file = std::fs::File::create(dest)?;
    std::io::copy(&mut response.into_body().as_reader(), &mut file).map_err(|e| {
        DownloadError::HttpError {
            url: url.to_owned(),
            reason: e.to_string(),
        }
    })?;
    Ok(())
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::github_archive(
        "https://github.com/lightningcpp/lightningcpp/archive/master.zip",
        Some("master.zip")
    )]
    #[case::fragment("https://example.test/src.tar.gz#top", Some("src.tar.gz"))]
    #[case::trailing_slash("https://example.test/dir/", None)]
    #[case::bare_host("https://", None)]
    #[case::file_url("file:///tmp/lightning.zip", Some("lightning.zip"))]
    fn extracts_file_name(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(file_name_from_url(url), expected);
    }

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/master.zip", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http_error() {
        let err = ureq::Error::StatusCode(500);
        let mapped = map_ureq_error("https://example.test/master.zip", &err);
        assert!(matches!(mapped, DownloadError::HttpError { .. }));
    }

    #[test]
    fn copies_file_urls() {
        let temp = tempfile::tempdir().expect("temp dir");
        let source = temp.path().join("src.zip");
        std::fs::write(&source, b"PK").expect("write source");
        let dest = temp.path().join("copy.zip");

        UrlDownloader
            .download(&format!("file://{}", source.display()), &dest)
            .expect("local copy");

        assert_eq!(std::fs::read(dest).expect("read copy"), b"PK");
    }

    #[test]
    fn missing_local_file_is_not_found() {
        let temp = tempfile::tempdir().expect("temp dir");
        let missing = temp.path().join("absent.zip");

        let err = UrlDownloader
            .download(
                &format!("file://{}", missing.display()),
                &temp.path().join("out"),
            )
            .expect_err("missing file");

        assert!(matches!(err, DownloadError::NotFound { .. }));
    }

    #[test]
    fn rejects_unknown_scheme() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = UrlDownloader
            .download("ftp://example.test/src.zip", &temp.path().join("out"))
            .expect_err("ftp is unsupported");
        assert!(matches!(err, DownloadError::UnsupportedScheme { .. }));
    }
}
