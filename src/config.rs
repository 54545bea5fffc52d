use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::cli::GlobalArgs;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cache_root: PathBuf,
    pub db_path: PathBuf,
    pub remote_url: Option<String>,
    pub sync_debounce: Duration,
    pub remote_timeout: Duration,
    pub page_size: usize,
}

impl Settings {
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let settings = Self {
            cache_root: args.cache_root.clone(),
            db_path: args
                .db_path
                .clone()
                .unwrap_or_else(|| args.cache_root.join("review.sqlite")),
            remote_url: args
                .remote_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(ToOwned::to_owned),
            sync_debounce: Duration::from_millis(args.sync_debounce_ms),
            remote_timeout: Duration::from_millis(args.remote_timeout_ms),
            page_size: args.page_size,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page size must be at least 1");
        }
        if self.sync_debounce.is_zero() {
            bail!("sync debounce must be greater than zero");
        }
        if self.remote_timeout.is_zero() {
            bail!("remote timeout must be greater than zero");
        }
        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("remote url must start with http:// or https://: {url}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GlobalArgs {
        GlobalArgs {
            cache_root: PathBuf::from(".cache/trace-review"),
            db_path: None,
            remote_url: None,
            sync_debounce_ms: 800,
            remote_timeout_ms: 3000,
            page_size: 25,
        }
    }

    #[test]
    fn db_path_defaults_under_cache_root() {
        let settings = Settings::from_args(&args()).expect("defaults should validate");
        assert_eq!(
            settings.db_path,
            PathBuf::from(".cache/trace-review/review.sqlite")
        );
        assert!(settings.remote_url.is_none());
    }

    #[test]
    fn blank_remote_url_means_local_only() {
        let mut raw = args();
        raw.remote_url = Some("   ".to_string());
        let settings = Settings::from_args(&raw).expect("blank url should validate");
        assert!(settings.remote_url.is_none());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut raw = args();
        raw.page_size = 0;
        assert!(Settings::from_args(&raw).is_err());
    }

    #[test]
    fn non_http_remote_url_is_rejected() {
        let mut raw = args();
        raw.remote_url = Some("ftp://example.test/annotations".to_string());
        assert!(Settings::from_args(&raw).is_err());
    }
}
