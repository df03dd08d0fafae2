use serde::{Deserialize, Serialize};

/// A registered account. `password_hash` is whatever the credentials
/// collaborator produced; the plaintext is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
}

/// Keyed by `(project, title)`. `resolved` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub project: String,
    pub reporter: String,
    pub title: String,
    pub description: String,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub project: String,
    pub title: String,
    pub content: String,
    pub commenter: String,
}

impl Issue {
    pub fn new(
        project: impl Into<String>,
        reporter: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Issue {
        Issue {
            project: project.into(),
            reporter: reporter.into(),
            title: title.into(),
            description: description.into(),
            resolved: false,
        }
    }
}
