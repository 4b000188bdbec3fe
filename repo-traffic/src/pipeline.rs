use crate::configuration::Settings;
use crate::domain::RepoName;
use crate::enumerator::ResourceEnumerator;
use crate::error::TrafficError;
use crate::export::ExportWriter;
use crate::github_client::GithubClient;
use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// What happened to one repository during a run.
#[derive(Debug)]
pub struct ResourceOutcome {
    pub repo: RepoName,
    /// The artifact that was written, or why there is none.
    pub result: Result<PathBuf, TrafficError>,
}

/// Per-repository outcomes of a run, in enumeration order.
#[derive(Debug)]
pub struct RunReport {
    pub date: NaiveDate,
    pub outcomes: Vec<ResourceOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn num_succeeded(&self) -> usize {
        self.succeeded().count()
    }

    pub fn num_failed(&self) -> usize {
        self.failed().count()
    }

    pub fn is_success(&self) -> bool {
        self.num_failed() == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.num_succeeded(),
            self.num_failed()
        )
    }
}

/// Collects the traffic of every enumerated repository and exports it as of `date`.
///
/// A missing or rejected credential, a refused listing or an invalid configured name aborts
/// the run. Other failures of individual repositories are recorded in the report and never
/// stop the others. At most `pipeline.max_concurrent_fetches` repositories are in flight;
/// with a single slot they are processed strictly one after the other.
#[tracing::instrument(name = "Collecting repository traffic", skip(settings, token), fields(account = %settings.github.account))]
pub async fn run(
    settings: &Settings,
    token: Option<SecretString>,
    date: NaiveDate,
) -> Result<RunReport, TrafficError> {
    let token = token
        .filter(|token| !token.expose_secret().trim().is_empty())
        .ok_or_else(|| {
            TrafficError::Auth(format!(
                "environment variable {} is not set",
                settings.github.token_env_var
            ))
        })?;
    let client = Arc::new(GithubClient::new(&settings.github, token)?);

    let enumerator =
        ResourceEnumerator::from_settings(&settings.enumeration, &settings.github.account);
    let repos = enumerator.enumerate(&client).await?;
    tracing::info!("Enumerated {} repositories", repos.len());

    let writer = Arc::new(ExportWriter::from_settings(&settings.output));
    let account: Arc<str> = settings.github.account.as_str().into();
    let slots = Arc::new(Semaphore::new(worker_slots(
        settings.pipeline.max_concurrent_fetches,
    )));
    let credential_rejected = Arc::new(AtomicBool::new(false));
    let num_repos = repos.len();
    let mut tasks = JoinSet::new();

    for (index, repo) in repos.into_iter().enumerate() {
        // Taking the permit before spawning keeps start order equal to enumeration order.
        let permit = Arc::clone(&slots)
            .acquire_owned()
            .await
            .map_err(|e| TrafficError::Transport(format!("worker pool closed: {}", e)))?;
        // Set before the permit is released, so no request follows a rejected one in sequence.
        if credential_rejected.load(Ordering::Acquire) {
            break;
        }
        let client = Arc::clone(&client);
        let writer = Arc::clone(&writer);
        let account = Arc::clone(&account);
        let credential_rejected = Arc::clone(&credential_rejected);
        tasks.spawn(async move {
            let result = process_resource(&client, &writer, &account, &repo, date).await;
            if matches!(result, Err(TrafficError::Auth(_))) {
                credential_rejected.store(true, Ordering::Release);
            }
            drop(permit);
            (index, ResourceOutcome { repo, result })
        });
    }

    let mut outcomes = Vec::with_capacity(num_repos);
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) =
            joined.unwrap_or_else(|e| std::panic::resume_unwind(e.into_panic()));
        match outcome.result {
            Err(TrafficError::Auth(message)) => {
                tasks.abort_all();
                return Err(TrafficError::Auth(message));
            }
            result => outcomes.push((
                index,
                ResourceOutcome {
                    repo: outcome.repo,
                    result,
                },
            )),
        }
    }
    outcomes.sort_unstable_by_key(|(index, _)| *index);

    let report = RunReport {
        date,
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
    };
    tracing::info!("Traffic collection finished: {}", report);
    Ok(report)
}

/// `Semaphore::new` panics above `MAX_PERMITS`, and zero slots would never make progress.
fn worker_slots(configured: usize) -> usize {
    configured.clamp(1, Semaphore::MAX_PERMITS)
}

#[tracing::instrument(name = "Exporting repository traffic", skip(client, writer, account, repo), fields(repo = %repo))]
async fn process_resource(
    client: &GithubClient,
    writer: &Arc<ExportWriter>,
    account: &str,
    repo: &RepoName,
    date: NaiveDate,
) -> Result<PathBuf, TrafficError> {
    let exported = export_traffic(client, writer, account, repo, date).await;
    if let Err(e) = &exported {
        tracing::error!("Skipping {}: {}", repo, e);
    }
    exported
}

async fn export_traffic(
    client: &GithubClient,
    writer: &Arc<ExportWriter>,
    account: &str,
    repo: &RepoName,
    date: NaiveDate,
) -> Result<PathBuf, TrafficError> {
    let records = client.fetch_traffic(account, repo).await?;
    let rows = records.len();
    let target = writer.artifact_path(repo, date);

    // File I/O stays off the async workers.
    let writer = Arc::clone(writer);
    let repo = repo.clone();
    let path = tokio::task::spawn_blocking(move || writer.write(&repo, date, &records))
        .await
        .map_err(|e| match e.try_into_panic() {
            Ok(panic) => std::panic::resume_unwind(panic),
            Err(e) => TrafficError::Write {
                path: target,
                source: std::io::Error::other(e).into(),
            },
        })??;

    tracing::info!("Wrote {} rows to {:?}", rows, path);
    Ok(path)
}
