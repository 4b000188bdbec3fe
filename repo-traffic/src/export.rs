use crate::configuration::{OutputLayout, OutputSettings};
use crate::domain::{RepoName, TrafficRecord};
use crate::error::TrafficError;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Writes one CSV file per (repository, date) under a root directory.
#[derive(Debug, Clone)]
pub struct ExportWriter {
    root_dir: PathBuf,
    layout: OutputLayout,
}

impl ExportWriter {
    pub fn new(root_dir: impl Into<PathBuf>, layout: OutputLayout) -> Self {
        Self {
            root_dir: root_dir.into(),
            layout,
        }
    }

    pub fn from_settings(output: &OutputSettings) -> Self {
        Self::new(&output.root_dir, output.layout)
    }

    fn directory(&self, repo: &RepoName) -> PathBuf {
        match self.layout {
            OutputLayout::PerResource => self.root_dir.join(repo.as_ref()),
            OutputLayout::Flat => self.root_dir.clone(),
        }
    }

    /// Where the artifact for `repo` on `date` lives.
    pub fn artifact_path(&self, repo: &RepoName, date: NaiveDate) -> PathBuf {
        self.directory(repo).join(format!(
            "traffic_{}_{}.csv",
            repo.as_ref(),
            date.format("%Y-%m-%d")
        ))
    }

    /// Replaces the artifact for `repo` on `date` with `records`, header row first.
    ///
    /// The rows go to a sibling `.tmp` file that is renamed over the artifact once complete,
    /// so a failed write leaves the previous artifact as it was.
    pub fn write(
        &self,
        repo: &RepoName,
        date: NaiveDate,
        records: &[TrafficRecord],
    ) -> Result<PathBuf, TrafficError> {
        let path = self.artifact_path(repo, date);
        let staging = path.with_extension("csv.tmp");
        std::fs::create_dir_all(self.directory(repo)).map_err(|e| write_error(&path, e.into()))?;

        let written = write_csv(records, &staging)
            .and_then(|()| std::fs::rename(&staging, &path).map_err(csv::Error::from));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(write_error(&path, e));
        }
        Ok(path)
    }
}

fn write_error(path: &Path, source: csv::Error) -> TrafficError {
    TrafficError::Write {
        path: path.to_owned(),
        source,
    }
}

// The header goes in by hand, as `csv` only emits one when the first row is serialized.
fn write_csv(records: &[TrafficRecord], path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(TrafficRecord::FIELDS)?;
    records
        .iter()
        .try_for_each(|record| writer.serialize(record))?;
    writer.flush()?;
    Ok(())
}
