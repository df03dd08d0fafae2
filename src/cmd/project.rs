use super::parse::Parse;
use super::{Backend, Outcome, ParseError};
use crate::db::Inserted;
use crate::frame::Frame;
use crate::model::Project;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProject {
    pub name: String,
}

impl CreateProject {
    pub fn new(name: impl ToString) -> CreateProject {
        CreateProject {
            name: name.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("project");

        frame.push_string(self.name);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<CreateProject, ParseError> {
        parse.expect_args(1)?;

        let name = parse.next_identifier("project name")?;

        Ok(CreateProject { name })
    }

    pub fn execute(self, backend: &Backend) -> crate::Result<Outcome> {
        let taken = "Could not create new project - project name is not unique";

        if backend.store.find_project(&self.name)?.is_some() {
            return Ok(Outcome::failure(taken));
        }

        let outcome = match backend.store.insert_project(Project { name: self.name })? {
            Inserted::Created => Outcome::success("Project created successfully"),
            Inserted::Duplicate => Outcome::failure(taken),
        };

        Ok(outcome)
    }
}
