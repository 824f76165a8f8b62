use crate::SearchError;
use url::Url;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9200;
pub const DEFAULT_INDEX_NAME: &str = "pdf_documents";

/// Where the OpenSearch cluster lives and which index holds the pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub index_name: String,
    pub use_tls: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            use_tls: false,
        }
    }
}

impl StoreConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn endpoint(&self) -> Result<Url, SearchError> {
        let scheme = if self.use_tls { "https" } else { "http" };
        let url = Url::parse(&format!("{scheme}://{}:{}/", self.host, self.port))?;
        Ok(url)
    }
}
