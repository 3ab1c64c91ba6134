use std::net::{IpAddr, ToSocketAddrs};
use std::sync::OnceLock;

use logfiles_core::{LocalIdentity, LOCALHOST};

/// The address this daemon reports for its own records and recognizes in
/// host lists. Resolution happens once.
#[derive(Debug, Default)]
pub struct SystemIdentity {
    advertised: Option<String>,
    resolved: OnceLock<String>,
}

impl SystemIdentity {
    pub fn new(advertised: Option<String>) -> Self {
        Self {
            advertised,
            resolved: OnceLock::new(),
        }
    }
}

impl LocalIdentity for SystemIdentity {
    fn local_address(&self) -> String {
        self.resolved
            .get_or_init(|| resolve_address(self.advertised.as_deref()))
            .clone()
    }
}

fn resolve_address(advertised: Option<&str>) -> String {
    if let Some(address) = advertised.map(str::trim).filter(|value| !value.is_empty()) {
        return address.to_string();
    }

    let hostname = gethostname::gethostname();
    let hostname = hostname.to_string_lossy();
    match (&*hostname, 0).to_socket_addrs() {
        Ok(addrs) => {
            let ipv4 = addrs.map(|addr| addr.ip()).find(IpAddr::is_ipv4);
            match ipv4 {
                Some(ip) => ip.to_string(),
                None => {
                    tracing::warn!(%hostname, "hostname has no IPv4 address, using localhost");
                    LOCALHOST.to_string()
                }
            }
        }
        Err(err) => {
            tracing::warn!(%hostname, error = %err, "hostname did not resolve, using localhost");
            LOCALHOST.to_string()
        }
    }
}
