use std::{fs, io::Write, process::ExitCode};

use anyhow::Context;
use ccs_probe::{campaign::Campaign, cli, conversation::scenarios};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    // diagnostics go to stderr, the transcript and summary to stdout
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(writer)
        .init();

    let matches = cli::command().get_matches();
    let cli::Cli { settings, campaign } = cli::Cli::from_matches(&matches)?;
    tracing::info!(host = settings.host, port = settings.port, "probing");

    let report_json = campaign.report_json.clone();
    let campaign = Campaign::new(scenarios::all(&settings)?, campaign, settings.timeout)?;

    let mut stdout = std::io::stdout().lock();
    let report = campaign.run(&mut rand::thread_rng(), &mut stdout)?;
    write!(stdout, "{report}")?;
    stdout.flush()?;

    if let Some(path) = report_json {
        fs::write(&path, report.to_json()?)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
