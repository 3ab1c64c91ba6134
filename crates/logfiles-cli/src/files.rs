use std::io::Write;

use clap::Args;
use logfiles_core::HostResult;
use logfilesd::{ErrorResponse, FILES_ROUTE, HOSTS_HEADER};
use reqwest::{Client, Url};

pub(crate) const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Args, Debug, Clone)]
pub(crate) struct FilesArgs {
    /// File inside the daemon's log directory; omit to query every file.
    pub(crate) file: Option<String>,
    /// Base URL of the daemon to ask.
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub(crate) server: String,
    /// Lines per file; -1 reads whole files.
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) n_lines: Option<i64>,
    /// Only return lines containing this text.
    #[arg(long)]
    pub(crate) keyword: Option<String>,
    /// 0 ascending, 1 descending.
    #[arg(long)]
    pub(crate) order_by: Option<i64>,
    /// Byte cursor from a previous answer (needs FILE).
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) start_pos: Option<i64>,
    /// Comma-separated hosts the daemon should fan out to.
    #[arg(long)]
    pub(crate) hosts: Option<String>,
    /// Print the daemon's JSON answer as is.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub(crate) json: bool,
}

pub(crate) async fn run_files(args: FilesArgs, out: &mut impl Write) -> anyhow::Result<()> {
    if args.file.is_none() && args.start_pos.is_some() {
        anyhow::bail!("--start-pos only applies to a single FILE");
    }

    let mut url = Url::parse(&format!("{}{FILES_ROUTE}", args.server.trim_end_matches('/')))?;
    if let Some(file) = &args.file {
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("server url cannot carry a path: {}", args.server))?
            .push(file);
    }

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(start_pos) = args.start_pos {
        query.push(("start_pos", start_pos.to_string()));
    }
    if let Some(n_lines) = args.n_lines {
        query.push(("n_lines", n_lines.to_string()));
    }
    if let Some(keyword) = &args.keyword {
        query.push(("keyword", keyword.clone()));
    }
    if let Some(order_by) = args.order_by {
        query.push(("order_by", order_by.to_string()));
    }

    let mut request = Client::new().get(url).query(&query);
    if let Some(hosts) = &args.hosts {
        request = request.header(HOSTS_HEADER, hosts);
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let detail = match response.json::<ErrorResponse>().await {
            Ok(body) => format!(": {}", body.message),
            Err(_) => String::new(),
        };
        anyhow::bail!("files query failed: {status}{detail}");
    }

    let body = response.text().await?;
    if args.json {
        writeln!(out, "{}", body.trim_end())?;
        return Ok(());
    }
    let results: Vec<HostResult> = serde_json::from_str(&body)?;
    render_results(&results, out)?;
    Ok(())
}

pub(crate) fn render_results(results: &[HostResult], out: &mut impl Write) -> std::io::Result<()> {
    for result in results {
        writeln!(out, "== {} ({} {})", result.host, result.status_code, result.status_message)?;
        for file in &result.files {
            writeln!(
                out,
                "-- {} ({} bytes, cursor {})",
                file.file.path, file.file.size, file.window.cursor
            )?;
            for line in &file.window.lines {
                writeln!(out, "{line}")?;
            }
        }
    }
    Ok(())
}
