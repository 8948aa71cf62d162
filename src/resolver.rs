//! Logical path to transport address resolution.

use url::Url;

use crate::Result;
use crate::error::Error;

/// Environment variable read by [`BaseUrl::from_env`].
pub const BASE_URL_VAR: &str = "REALTIME_API_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Maps a logical path such as `/ws/chat` to a full `ws://` or `wss://` address.
pub trait Resolve {
    fn resolve(&self, path: &str) -> Result<Url>;
}

/// Resolves paths against the API base URL, switching `http`/`https` to `ws`/`wss`.
///
/// ```
/// use realtime_socket::resolver::{BaseUrl, Resolve as _};
///
/// let base = BaseUrl::new("https://api.example.com/v1/")?;
/// assert_eq!(
///     base.resolve("/ws/chat")?.as_str(),
///     "wss://api.example.com/v1/ws/chat"
/// );
/// # Ok::<(), realtime_socket::error::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    base: Url,
}

impl BaseUrl {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;

        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::validation(format!(
                    "unsupported base URL scheme `{other}`"
                )));
            }
        };
        base.set_scheme(scheme)
            .map_err(|()| Error::validation(format!("cannot switch {base} to {scheme}")))?;

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base })
    }

    /// Reads [`BASE_URL_VAR`], falling back to `http://localhost:8000`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(BASE_URL_VAR) {
            Ok(base) => Self::new(&base),
            Err(_missing) => Self::new(DEFAULT_BASE_URL),
        }
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.base
    }
}

impl Resolve for BaseUrl {
    fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }
}
