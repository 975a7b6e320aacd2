use url::Url;

use crate::{Error, Result};

/// Parses an outbound proxy URL. Only `http*` and `sock*` schemes are
/// accepted, e.g. `http://127.0.0.1:7890` or `socks5://127.0.0.1:1080`.
pub fn parse_proxy_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|source| Error::InvalidProxyUrl {
        url: raw.to_string(),
        source,
    })?;

    let scheme = url.scheme();
    if scheme.starts_with("http") || scheme.starts_with("sock") {
        Ok(url)
    } else {
        Err(Error::UnsupportedProxyScheme {
            scheme: scheme.to_string(),
        })
    }
}
