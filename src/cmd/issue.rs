use super::parse::Parse;
use super::{Backend, Outcome, ParseError, PROJECT_NOT_FOUND};
use crate::db::{Inserted, Resolution};
use crate::frame::Frame;
use crate::model::{Comment, Issue};

/// Files a new, unresolved issue.
///
/// The `reporter` field is part of the wire format but ignored on execution;
/// the issue is always attributed to the session's own user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIssue {
    pub project: String,
    pub reporter: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveIssue {
    pub project: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListIssues {
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindIssue {
    pub project: String,
    pub title: String,
}

fn project_exists(backend: &Backend, project: &str) -> crate::Result<bool> {
    Ok(backend.store.find_project(project)?.is_some())
}

impl FileIssue {
    pub fn new(
        project: impl ToString,
        reporter: impl ToString,
        title: impl ToString,
        description: impl ToString,
    ) -> FileIssue {
        FileIssue {
            project: project.to_string(),
            reporter: reporter.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("issue");

        frame.push_string(self.project);
        frame.push_string(self.reporter);
        frame.push_string(self.title);
        frame.push_string(self.description);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<FileIssue, ParseError> {
        parse.expect_args(4)?;

        let project = parse.next_identifier("project name")?;
        let reporter = parse.next_string()?;
        let title = parse.next_identifier("issue title")?;
        let description = parse.next_string()?;

        Ok(FileIssue {
            project,
            reporter,
            title,
            description,
        })
    }

    pub fn execute(self, username: &str, backend: &Backend) -> crate::Result<Outcome> {
        if !project_exists(backend, &self.project)? {
            return Ok(Outcome::failure(PROJECT_NOT_FOUND));
        }

        let taken = "Could not create new issue - issue name is not unique for project";

        if backend
            .store
            .find_issue(&self.project, &self.title)?
            .is_some()
        {
            return Ok(Outcome::failure(taken));
        }

        let issue = Issue::new(self.project, username, self.title, self.description);

        let outcome = match backend.store.insert_issue(issue)? {
            Inserted::Created => Outcome::success("Issue created successfully"),
            Inserted::Duplicate => Outcome::failure(taken),
        };

        Ok(outcome)
    }
}

impl ResolveIssue {
    pub fn new(project: impl ToString, title: impl ToString) -> ResolveIssue {
        ResolveIssue {
            project: project.to_string(),
            title: title.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("resolve");

        frame.push_string(self.project);
        frame.push_string(self.title);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<ResolveIssue, ParseError> {
        parse.expect_args(2)?;

        let project = parse.next_identifier("project name")?;
        let title = parse.next_identifier("issue title")?;

        Ok(ResolveIssue { project, title })
    }

    pub fn execute(self, backend: &Backend) -> crate::Result<Outcome> {
        if !project_exists(backend, &self.project)? {
            return Ok(Outcome::failure(PROJECT_NOT_FOUND));
        }

        let outcome = match backend.store.resolve_issue(&self.project, &self.title)? {
            Resolution::Resolved => Outcome::success("Issue resolved successfully"),
            Resolution::AlreadyResolved => Outcome::failure("Issue is already resolved"),
            Resolution::Missing => {
                Outcome::failure("Could not resolve issue - issue does not exist")
            }
        };

        Ok(outcome)
    }
}

impl ListIssues {
    pub fn new(project: impl ToString) -> ListIssues {
        ListIssues {
            project: project.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("list");

        frame.push_string(self.project);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<ListIssues, ParseError> {
        parse.expect_args(1)?;

        let project = parse.next_identifier("project name")?;

        Ok(ListIssues { project })
    }

    pub fn execute(self, backend: &Backend) -> crate::Result<Outcome> {
        if !project_exists(backend, &self.project)? {
            return Ok(Outcome::failure(PROJECT_NOT_FOUND));
        }

        let issues = backend.store.list_issues(&self.project)?;

        if issues.is_empty() {
            return Ok(Outcome::success("There aren't any issues in this project"));
        }

        let titles: Vec<&str> = issues.iter().map(|issue| issue.title.as_str()).collect();

        Ok(Outcome::success(format!(
            "Issues in project: {}",
            titles.join(", ")
        )))
    }
}

impl FindIssue {
    pub fn new(project: impl ToString, title: impl ToString) -> FindIssue {
        FindIssue {
            project: project.to_string(),
            title: title.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("find");

        frame.push_string(self.project);
        frame.push_string(self.title);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<FindIssue, ParseError> {
        parse.expect_args(2)?;

        let project = parse.next_identifier("project name")?;
        let title = parse.next_identifier("issue title")?;

        Ok(FindIssue { project, title })
    }

    pub fn execute(self, backend: &Backend) -> crate::Result<Outcome> {
        if !project_exists(backend, &self.project)? {
            return Ok(Outcome::failure(PROJECT_NOT_FOUND));
        }

        let Some(issue) = backend.store.find_issue(&self.project, &self.title)? else {
            return Ok(Outcome::failure("Issue does not exist"));
        };

        let comments = backend.store.list_comments(&self.project, &self.title)?;

        Ok(Outcome::success(render(&issue, &comments)))
    }
}

/// `Project: p; Reporter: r; ...; Comments: "text" - author; "text" - author;`
fn render(issue: &Issue, comments: &[Comment]) -> String {
    let comments = if comments.is_empty() {
        "none;".to_string()
    } else {
        comments
            .iter()
            .map(|comment| format!("\"{}\" - {};", comment.content, comment.commenter))
            .collect::<Vec<_>>()
            .join(" ")
    };

    format!(
        "Project: {}; Reporter: {}; Title: {}; Description: {}; Resolved: {}; Comments: {}",
        issue.project, issue.reporter, issue.title, issue.description, issue.resolved, comments
    )
}
