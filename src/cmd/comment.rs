use super::parse::Parse;
use super::{Backend, Outcome, ParseError, PROJECT_NOT_FOUND};
use crate::frame::Frame;
use crate::model;

/// Appends a comment to an existing issue. As with [`super::FileIssue`], the
/// `commenter` on the wire is ignored in favour of the session's user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub project: String,
    pub title: String,
    pub content: String,
    pub commenter: String,
}

impl Comment {
    pub fn new(
        project: impl ToString,
        title: impl ToString,
        content: impl ToString,
        commenter: impl ToString,
    ) -> Comment {
        Comment {
            project: project.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            commenter: commenter.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("comment");

        frame.push_string(self.project);
        frame.push_string(self.title);
        frame.push_string(self.content);
        frame.push_string(self.commenter);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Comment, ParseError> {
        parse.expect_args(4)?;

        let project = parse.next_identifier("project name")?;
        let title = parse.next_identifier("issue title")?;
        let content = parse.next_string()?;
        let commenter = parse.next_string()?;

        Ok(Comment {
            project,
            title,
            content,
            commenter,
        })
    }

    pub fn execute(self, username: &str, backend: &Backend) -> crate::Result<Outcome> {
        if backend.store.find_project(&self.project)?.is_none() {
            return Ok(Outcome::failure(PROJECT_NOT_FOUND));
        }

        if backend
            .store
            .find_issue(&self.project, &self.title)?
            .is_none()
        {
            return Ok(Outcome::failure("Issue does not exist"));
        }

        backend.store.insert_comment(model::Comment {
            project: self.project,
            title: self.title,
            content: self.content,
            commenter: username.to_string(),
        })?;

        Ok(Outcome::success("Comment added successfully"))
    }
}
