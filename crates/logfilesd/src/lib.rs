mod config;
mod identity;
mod remote;
mod server;
pub mod telemetry;

pub use config::{
    load_effective_config, resolve_settings, ConfigSourceReport, DaemonSettings, LoadedConfig,
    LogFilesConfig, RemoteConfig, RemoteSettings, SettingsOverrides,
};
pub use identity::SystemIdentity;
pub use remote::HttpRemoteQuery;
pub use server::{build_app, build_app_with, serve, ErrorResponse, FILES_ROUTE, HOSTS_HEADER};

/// Resolves settings from the working directory and runs until the listener
/// fails.
pub async fn serve_with_overrides(overrides: SettingsOverrides) -> std::io::Result<()> {
    let working_dir = std::env::current_dir()?;
    let (settings, loaded) = resolve_settings(&working_dir, overrides);
    for source in &loaded.sources {
        let (path, status) = (&source.path, &source.status);
        match &source.error {
            Some(error) => tracing::warn!(%path, %status, %error, "config source"),
            None => tracing::info!(%path, %status, "config source"),
        }
    }
    serve(settings).await
}

pub async fn serve_default() -> std::io::Result<()> {
    serve_with_overrides(SettingsOverrides::default()).await
}
