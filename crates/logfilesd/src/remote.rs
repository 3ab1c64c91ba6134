use futures_util::future::BoxFuture;
use logfiles_core::{
    HostResult, HostStatus, LogFilesError, RemoteQuery, RemoteRequest, Result, LOCALHOST,
};
use reqwest::Url;

use crate::config::RemoteSettings;
use crate::server::{ErrorResponse, FILES_ROUTE, HOSTS_HEADER};

/// Asks a peer daemon over HTTP. The peer is told to answer for itself
/// only, so a query never bounces between daemons.
pub struct HttpRemoteQuery {
    client: reqwest::Client,
    scheme: String,
    peer_port: Option<u16>,
}

impl HttpRemoteQuery {
    pub fn new(settings: &RemoteSettings) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            scheme: settings.scheme.clone(),
            peer_port: settings.peer_port,
        })
    }

    /// Hosts that already name a port keep it; bare hosts get the configured
    /// peer port, if any.
    pub fn url_for(&self, host: &str, request: &RemoteRequest) -> Result<Url> {
        let authority = match self.peer_port {
            Some(port) if !host.contains(':') => format!("{host}:{port}"),
            _ => host.to_string(),
        };
        let mut url = Url::parse(&format!("{}://{authority}{FILES_ROUTE}", self.scheme))
            .map_err(|err| LogFilesError::unreachable(host, err))?;
        if let Some(name) = &request.file_name {
            url.path_segments_mut()
                .map_err(|()| LogFilesError::unreachable(host, "url cannot carry a path"))?
                .push(name);
        }
        Ok(url)
    }

    async fn fetch(&self, host: &str, request: &RemoteRequest) -> Result<HostResult> {
        let url = self.url_for(host, request)?;
        let response = self
            .client
            .get(url)
            .query(&request.query_pairs())
            .header(HOSTS_HEADER, LOCALHOST)
            .send()
            .await
            .map_err(|err| LogFilesError::unreachable(host, err))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.message,
                Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
            };
            tracing::debug!(host, status = status.as_u16(), "peer answered with an error");
            return Ok(HostResult::failure(host, status.as_u16(), message));
        }

        let mut results: Vec<HostResult> = response
            .json()
            .await
            .map_err(|err| LogFilesError::unreachable(host, err))?;
        if results.is_empty() {
            let status = HostStatus::InternalServerError;
            return Ok(HostResult::failure(host, status.code(), "peer returned no results"));
        }
        Ok(results.swap_remove(0))
    }
}

impl RemoteQuery for HttpRemoteQuery {
    fn query_host<'a>(
        &'a self,
        host: &'a str,
        request: &'a RemoteRequest,
    ) -> BoxFuture<'a, Result<HostResult>> {
        Box::pin(self.fetch(host, request))
    }
}
