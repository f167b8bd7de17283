use crate::config::FetchConfig;
use crate::errors::{ConfigError, FetchError};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Raw content of one fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL, used to resolve relative links found on the page
    pub url: String,
    pub body: String,
}

/// Anything that can turn a URL into page content.
///
/// Implementations are not required to be shareable across threads; the
/// harvester builds one per worker.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for Box<T> {
    fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        (**self).fetch(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherKind {
    Http,
    File,
}

impl FromStr for FetcherKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(FetcherKind::Http),
            "file" => Ok(FetcherKind::File),
            other => Err(ConfigError::UnsupportedFetcher(other.to_string())),
        }
    }
}

/// Validated recipe for building fetchers, one per worker.
#[derive(Debug, Clone)]
pub struct FetcherSpec {
    pub kind: FetcherKind,
    pub timeout: Duration,
    pub user_agent: String,
    pub mirror: Option<PathBuf>,
}

impl FetcherSpec {
    pub fn from_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        let kind: FetcherKind = config.kind.parse()?;
        let mirror = config.mirror.as_ref().map(PathBuf::from);
        if kind == FetcherKind::File {
            match &mirror {
                Some(dir) if dir.is_dir() => {}
                Some(dir) => {
                    return Err(ConfigError::FetcherInit(format!(
                        "mirror directory does not exist: {}",
                        dir.display()
                    )))
                }
                None => {
                    return Err(ConfigError::FetcherInit(
                        "the file fetcher needs a mirror directory".to_string(),
                    ))
                }
            }
        }
        Ok(Self {
            kind,
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
            mirror,
        })
    }

    pub fn build(&self) -> Result<Box<dyn PageFetcher>, FetchError> {
        match self.kind {
            FetcherKind::Http => Ok(Box::new(HttpFetcher::new(self.timeout, &self.user_agent)?)),
            FetcherKind::File => {
                let root = self
                    .mirror
                    .clone()
                    .ok_or_else(|| FetchError::Init("no mirror directory configured".into()))?;
                Ok(Box::new(FileFetcher::new(root)))
            }
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Init(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let response = self.client.get(url).send().map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().map_err(|e| self.classify(url, e))?;
        debug!(url = url, bytes = body.len(), "Fetched page");
        Ok(Page {
            url: final_url,
            body,
        })
    }
}

impl HttpFetcher {
    fn classify(&self, url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Serves pages from an offline copy of the site laid out as `<root>/<host>/<path>`.
/// `file://` URLs are read directly.
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn local_path(&self, url: &str) -> Result<PathBuf, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() == "file" {
            return parsed.to_file_path().map_err(|_| FetchError::InvalidUrl {
                url: url.to_string(),
                reason: "not a local path".to_string(),
            });
        }

        let mut path = self.root.join(parsed.host_str().unwrap_or_default());
        for segment in parsed.path_segments().into_iter().flatten() {
            if segment.is_empty() || segment == ".." {
                continue;
            }
            path.push(segment);
        }
        if parsed.path().ends_with('/') {
            path.push("index.html");
        }
        Ok(path)
    }
}

impl PageFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let path = self.local_path(url)?;
        let body = read_page(&path)?;
        Ok(Page {
            url: url.to_string(),
            body,
        })
    }
}

fn read_page(path: &Path) -> Result<String, FetchError> {
    let bytes = fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kind_parses_known_values() {
        assert_eq!("http".parse::<FetcherKind>().unwrap(), FetcherKind::Http);
        assert_eq!(" FILE ".parse::<FetcherKind>().unwrap(), FetcherKind::File);
    }

    #[test]
    fn unknown_kind_is_config_error() {
        let err = "selenium".parse::<FetcherKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFetcher(k) if k == "selenium"));
    }

    #[test]
    fn file_spec_requires_mirror() {
        let config = FetchConfig {
            kind: "file".to_string(),
            ..FetchConfig::default()
        };
        assert!(matches!(
            FetcherSpec::from_config(&config),
            Err(ConfigError::FetcherInit(_))
        ));
    }

    #[test]
    fn file_fetcher_maps_host_and_path() {
        let dir = TempDir::new().unwrap();
        let page_dir = dir.path().join("example.com").join("data");
        fs::create_dir_all(&page_dir).unwrap();
        fs::write(page_dir.join("Quartz.shtml"), "<html>quartz</html>").unwrap();
        fs::write(page_dir.join("index.html"), "<html>index</html>").unwrap();

        let fetcher = FileFetcher::new(dir.path());
        let page = fetcher
            .fetch("http://example.com/data/Quartz.shtml")
            .unwrap();
        assert_eq!(page.body, "<html>quartz</html>");
        assert_eq!(page.url, "http://example.com/data/Quartz.shtml");

        let index = fetcher.fetch("http://example.com/data/").unwrap();
        assert_eq!(index.body, "<html>index</html>");
    }

    #[test]
    fn file_fetcher_missing_page_is_io_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = FileFetcher::new(dir.path());
        let err = fetcher.fetch("http://example.com/nope.shtml").unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
        assert!(!err.is_timeout());
    }

    #[test]
    fn file_spec_builds_file_fetcher() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("example.com")).unwrap();
        fs::write(dir.path().join("example.com").join("a.shtml"), "A").unwrap();

        let config = FetchConfig {
            kind: "file".to_string(),
            mirror: Some(dir.path().to_string_lossy().to_string()),
            ..FetchConfig::default()
        };
        let fetcher = FetcherSpec::from_config(&config).unwrap().build().unwrap();
        assert_eq!(fetcher.fetch("http://example.com/a.shtml").unwrap().body, "A");
    }
}
