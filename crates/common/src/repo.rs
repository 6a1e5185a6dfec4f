// Repository identifiers: `owner/repo` validation and remote URL construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum allowed length of the owner or repo segment.
const MAX_SEGMENT_CHARS: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoNameError {
    #[error("repository name is empty")]
    Empty,

    #[error("repository name must have the form `owner/repo`, got `{0}`")]
    MissingSeparator(String),

    #[error("repository name has an empty segment: `{0}`")]
    EmptySegment(String),

    #[error("repository segment `{segment}` contains invalid character {ch:?}")]
    InvalidCharacter { segment: String, ch: char },

    #[error("repository segment `{0}` is reserved")]
    Reserved(String),

    #[error("repository segment exceeds maximum length of {MAX_SEGMENT_CHARS} characters")]
    TooLong,
}

/// A validated `owner/repo` identifier.
///
/// Rules:
/// - Surrounding whitespace and a trailing `.git` are stripped
/// - Exactly one `/` separating two non-empty segments
/// - Segments use ASCII letters, digits, `-`, `_` and `.` only
/// - `.` and `..` are rejected as segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerRepo {
    owner: String,
    repo: String,
}

impl OwnerRepo {
    pub fn parse(input: &str) -> Result<Self, RepoNameError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RepoNameError::Empty);
        }

        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        let Some((owner, repo)) = trimmed.split_once('/') else {
            return Err(RepoNameError::MissingSeparator(trimmed.to_string()));
        };

        if owner.is_empty() || repo.is_empty() {
            return Err(RepoNameError::EmptySegment(trimmed.to_string()));
        }

        validate_segment(owner)?;
        validate_segment(repo)?;

        Ok(Self { owner: owner.to_string(), repo: repo.to_string() })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// HTTPS clone URL on `host`, e.g. `https://github.com/owner/repo.git`.
    pub fn remote_url(&self, host: &str) -> String {
        format!("https://{}/{}/{}.git", host.trim_end_matches('/'), self.owner, self.repo)
    }
}

fn validate_segment(segment: &str) -> Result<(), RepoNameError> {
    if segment == "." || segment == ".." {
        return Err(RepoNameError::Reserved(segment.to_string()));
    }
    if segment.chars().count() > MAX_SEGMENT_CHARS {
        return Err(RepoNameError::TooLong);
    }
    if let Some(ch) =
        segment.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(RepoNameError::InvalidCharacter { segment: segment.to_string(), ch });
    }
    Ok(())
}

impl fmt::Display for OwnerRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for OwnerRepo {
    type Err = RepoNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OwnerRepo {
    type Error = RepoNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OwnerRepo> for String {
    fn from(value: OwnerRepo) -> Self {
        value.to_string()
    }
}

/// Which repository the snapshots are pushed to, if any has been chosen yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RepoName {
    #[default]
    NotConfigured,
    Configured(OwnerRepo),
}

impl RepoName {
    pub fn configured(&self) -> Option<&OwnerRepo> {
        match self {
            Self::Configured(repo) => Some(repo),
            Self::NotConfigured => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }
}

impl From<Option<OwnerRepo>> for RepoName {
    fn from(value: Option<OwnerRepo>) -> Self {
        value.map_or(Self::NotConfigured, Self::Configured)
    }
}
