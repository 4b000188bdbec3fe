mod repo_name;
mod traffic;

pub use repo_name::RepoName;
pub use traffic::TrafficRecord;
