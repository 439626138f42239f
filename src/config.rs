//! Connect options builder: typed setters plus an explicit `build()` validation pass, rather
//! than public struct-literal construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthProvider, PatAuthProvider};
use crate::error::Error;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAuthMethod {
    None,
    Basic,
    Negotiate,
}

/// Credential union. OAuth acquisition flows are out of scope; the
/// core accepts only a PAT or a caller-supplied provider.
pub enum Credential {
    PersonalAccessToken(String),
    External(Arc<dyn AuthProvider>),
}

pub struct ConnectionOptionsBuilder {
    server_hostname: Option<String>,
    http_path: Option<String>,
    credential: Option<Credential>,
    catalog: Option<String>,
    schema: Option<String>,
    session_configuration: HashMap<String, String>,
    use_sea: bool,
    use_cloud_fetch: bool,
    lz4_compression: bool,
    max_download_threads: usize,
    use_inline_params: bool,
    retry_config: RetryConfig,
    socket_timeout: Duration,
    proxy_auth_method: ProxyAuthMethod,
}

impl Default for ConnectionOptionsBuilder {
    fn default() -> Self {
        Self {
            server_hostname: None,
            http_path: None,
            credential: None,
            catalog: None,
            schema: None,
            session_configuration: HashMap::new(),
            use_sea: false,
            use_cloud_fetch: true,
            lz4_compression: true,
            max_download_threads: crate::constants::DEFAULT_MAX_DOWNLOAD_THREADS,
            use_inline_params: false,
            retry_config: RetryConfig::default(),
            socket_timeout: Duration::from_secs(900),
            proxy_auth_method: ProxyAuthMethod::None,
        }
    }
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn server_hostname(mut self, value: impl Into<String>) -> Self {
        self.server_hostname = Some(value.into());
        self
    }

    #[must_use]
    pub fn http_path(mut self, value: impl Into<String>) -> Self {
        self.http_path = Some(value.into());
        self
    }

    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(Credential::PersonalAccessToken(token.into()));
        self
    }

    #[must_use]
    pub fn auth_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.credential = Some(Credential::External(provider));
        self
    }

    #[must_use]
    pub fn catalog(mut self, value: impl Into<String>) -> Self {
        self.catalog = Some(value.into());
        self
    }

    #[must_use]
    pub fn schema(mut self, value: impl Into<String>) -> Self {
        self.schema = Some(value.into());
        self
    }

    #[must_use]
    pub fn session_configuration(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.session_configuration.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn use_sea(mut self, value: bool) -> Self {
        self.use_sea = value;
        self
    }

    #[must_use]
    pub const fn use_cloud_fetch(mut self, value: bool) -> Self {
        self.use_cloud_fetch = value;
        self
    }

    #[must_use]
    pub const fn lz4_compression(mut self, value: bool) -> Self {
        self.lz4_compression = value;
        self
    }

    #[must_use]
    pub const fn max_download_threads(mut self, value: usize) -> Self {
        self.max_download_threads = value;
        self
    }

    #[must_use]
    pub const fn use_inline_params(mut self, value: bool) -> Self {
        self.use_inline_params = value;
        self
    }

    #[must_use]
    pub fn retry_config(mut self, value: RetryConfig) -> Self {
        self.retry_config = value;
        self
    }

    #[must_use]
    pub const fn socket_timeout(mut self, value: Duration) -> Self {
        self.socket_timeout = value;
        self
    }

    #[must_use]
    pub const fn proxy_auth_method(mut self, value: ProxyAuthMethod) -> Self {
        self.proxy_auth_method = value;
        self
    }

    /// Validates required fields and produces the frozen [`ConnectionOptions`].
    pub fn build(self) -> Result<ConnectionOptions, Error> {
        let server_hostname = self
            .server_hostname
            .ok_or_else(|| Error::interface("server_hostname is required"))?;
        let http_path = self.http_path.ok_or_else(|| Error::interface("http_path is required"))?;
        let credential = self
            .credential
            .ok_or_else(|| Error::interface("a credential (access_token or auth_provider) is required"))?;

        if self.max_download_threads == 0 {
            return Err(Error::interface("max_download_threads must be >= 1"));
        }

        Ok(ConnectionOptions {
            server_hostname,
            http_path,
            credential,
            catalog: self.catalog,
            schema: self.schema,
            session_configuration: self.session_configuration,
            use_sea: self.use_sea,
            use_cloud_fetch: self.use_cloud_fetch,
            lz4_compression: self.lz4_compression,
            max_download_threads: self.max_download_threads,
            use_inline_params: self.use_inline_params,
            retry_config: self.retry_config,
            socket_timeout: self.socket_timeout,
            proxy_auth_method: self.proxy_auth_method,
        })
    }
}

/// Frozen, validated connect options. Construct via [`ConnectionOptionsBuilder`].
pub struct ConnectionOptions {
    pub server_hostname: String,
    pub http_path: String,
    pub credential: Credential,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub session_configuration: HashMap<String, String>,
    pub use_sea: bool,
    pub use_cloud_fetch: bool,
    pub lz4_compression: bool,
    pub max_download_threads: usize,
    pub use_inline_params: bool,
    pub retry_config: RetryConfig,
    pub socket_timeout: Duration,
    pub proxy_auth_method: ProxyAuthMethod,
}

impl ConnectionOptions {
    #[must_use]
    pub fn auth_provider(&self) -> Arc<dyn AuthProvider> {
        match &self.credential {
            Credential::PersonalAccessToken(token) => Arc::new(PatAuthProvider::new(token)),
            Credential::External(provider) => Arc::clone(provider),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_hostname_path_and_credential() {
        let err = ConnectionOptionsBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Interface(_)));
    }

    #[test]
    fn build_succeeds_with_required_fields() {
        let options = ConnectionOptionsBuilder::new()
            .server_hostname("example.cloud.databricks.com")
            .http_path("/sql/1.0/warehouses/abc")
            .access_token("token")
            .build()
            .unwrap();
        assert_eq!(options.max_download_threads, crate::constants::DEFAULT_MAX_DOWNLOAD_THREADS);
        assert!(options.use_cloud_fetch);
    }

    #[test]
    fn zero_download_threads_rejected() {
        let err = ConnectionOptionsBuilder::new()
            .server_hostname("h")
            .http_path("/p")
            .access_token("t")
            .max_download_threads(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Interface(_)));
    }
}
