use crate::configuration::{EnumerationMode, EnumerationSettings};
use crate::domain::RepoName;
use crate::error::TrafficError;
use crate::github_client::GithubClient;

/// Decides which repositories a run visits.
#[derive(Debug, Clone)]
pub enum ResourceEnumerator {
    /// Every repository the listing endpoint reports for `account`.
    Dynamic { account: String },
    /// A fixed list, taken verbatim: order and duplicates are preserved.
    Static { repositories: Vec<String> },
}

impl ResourceEnumerator {
    pub fn from_settings(enumeration: &EnumerationSettings, account: &str) -> Self {
        match enumeration.mode {
            EnumerationMode::Dynamic => Self::Dynamic {
                account: account.to_owned(),
            },
            EnumerationMode::Static => Self::Static {
                repositories: enumeration.repositories.clone(),
            },
        }
    }

    pub async fn enumerate(&self, client: &GithubClient) -> Result<Vec<RepoName>, TrafficError> {
        match self {
            Self::Dynamic { account } => client.list_repositories(account).await,
            Self::Static { repositories } => repositories
                .iter()
                .map(|name| RepoName::parse(name.clone()).map_err(TrafficError::InvalidResource))
                .collect(),
        }
    }
}
