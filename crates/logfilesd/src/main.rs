#[tokio::main]
async fn main() {
    logfilesd::telemetry::init_tracing();
    if let Err(err) = logfilesd::serve_default().await {
        tracing::error!(error = %err, "logfilesd stopped");
        std::process::exit(1);
    }
}
