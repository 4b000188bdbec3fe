use anyhow::Context;
use repo_traffic::configuration::get_configuration;
use repo_traffic::pipeline::run;
use repo_traffic::telemetry::{get_subscriber, init_subscriber};
use secrecy::SecretString;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Set up tracing telemetry.
    let subscriber = get_subscriber("repo-traffic".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    // Get config settings
    let configuration = get_configuration().context("Failed to read configuration.")?;

    // The token is read once and only ever handed to the GitHub client.
    let token = std::env::var(&configuration.github.token_env_var)
        .ok()
        .map(SecretString::from);
    let today = chrono::Local::now().date_naive();

    let report = run(&configuration, token, today)
        .await
        .inspect_err(|e| tracing::error!("Traffic collection aborted: {}", e))
        .context("Traffic collection aborted")?;

    for outcome in report.failed() {
        if let Err(e) = &outcome.result {
            tracing::warn!("{} was not exported: {}", outcome.repo, e);
        }
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
