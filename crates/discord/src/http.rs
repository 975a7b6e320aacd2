use {
    anyhow::Context as _,
    serenity::http::{Http, HttpBuilder},
    tracing::info,
    url::Url,
};

/// REST client for `token`, routed through `proxy` when one is configured.
///
/// Only REST calls use the proxy; the gateway websocket connects directly.
pub fn build_http(token: &str, proxy: Option<&Url>) -> anyhow::Result<Http> {
    let mut builder = HttpBuilder::new(token);
    if let Some(proxy) = proxy {
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy.as_str()).context("invalid proxy url")?)
            .build()
            .context("failed to build proxied http client")?;
        info!(scheme = proxy.scheme(), host = ?proxy.host_str(), "discord REST calls go through proxy");
        builder = builder.client(client);
    }
    Ok(builder.build())
}
