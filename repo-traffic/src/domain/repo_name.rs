use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

/// A repository name that is safe to embed in a URL path segment and a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoName(String);

impl RepoName {
    pub fn parse(s: String) -> Result<Self, String> {
        let forbidden_characters = [
            '/', '\\', ':', '*', '?', '"', '<', '>', '|', '{', '}', '#', '%',
        ];

        if s.trim().is_empty() {
            Err(format!("Repository name {:?} has no non-whitespace characters.", s))
        } else if s.graphemes(true).count() > 100 {
            Err(format!("Repository name {} is too long.", s))
        } else if s == "." || s == ".." {
            Err(format!("Repository name {} is reserved.", s))
        } else if s
            .chars()
            .any(|c| forbidden_characters.contains(&c) || c.is_control())
        {
            Err(format!("Repository name {:?} contains forbidden characters.", s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
