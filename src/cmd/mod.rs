use std::fmt;
use std::sync::Arc;

mod account;
mod comment;
mod issue;
mod parse;
mod project;

pub use account::{Login, Logout, Register};
pub use comment::Comment;
pub use issue::{FileIssue, FindIssue, ListIssues, ResolveIssue};
pub use parse::ParseError;
pub use project::CreateProject;

use crate::auth::Credentials;
use crate::db::Store;
use crate::frame::Frame;
use crate::session::Session;
use parse::Parse;

pub(crate) const NOT_LOGGED_IN: &str = "You are not logged in";
pub(crate) const PROJECT_NOT_FOUND: &str = "Could not find project";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register(Register),
    Login(Login),
    Logout(Logout),
    CreateProject(CreateProject),
    FileIssue(FileIssue),
    ResolveIssue(ResolveIssue),
    ListIssues(ListIssues),
    FindIssue(FindIssue),
    Comment(Comment),
}

/// Result of running one command: the sentence sent back to the client and
/// whether the command took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    pub success: bool,
}

/// Collaborators every command executes against. Cheap to clone; shared by
/// all sessions.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn Store>,
    pub credentials: Arc<dyn Credentials>,
}

impl Command {
    /// Maps field 0 of a decoded line to a command and builds it from the
    /// remaining fields, checking the argument count first.
    pub fn from_frame(frame: Frame) -> Result<Command, ParseError> {
        let mut parse = Parse::new(frame)?;

        let command = match parse.command() {
            "register" => Command::Register(Register::parse_frames(&mut parse)?),
            "login" => Command::Login(Login::parse_frames(&mut parse)?),
            "logout" => Command::Logout(Logout::parse_frames(&mut parse)?),
            "project" => Command::CreateProject(CreateProject::parse_frames(&mut parse)?),
            "issue" => Command::FileIssue(FileIssue::parse_frames(&mut parse)?),
            "resolve" => Command::ResolveIssue(ResolveIssue::parse_frames(&mut parse)?),
            "list" => Command::ListIssues(ListIssues::parse_frames(&mut parse)?),
            "find" => Command::FindIssue(FindIssue::parse_frames(&mut parse)?),
            "comment" => Command::Comment(Comment::parse_frames(&mut parse)?),
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };

        parse.finish()?;

        Ok(command)
    }

    pub fn into_frame(self) -> Frame {
        match self {
            Command::Register(cmd) => cmd.into_frame(),
            Command::Login(cmd) => cmd.into_frame(),
            Command::Logout(cmd) => cmd.into_frame(),
            Command::CreateProject(cmd) => cmd.into_frame(),
            Command::FileIssue(cmd) => cmd.into_frame(),
            Command::ResolveIssue(cmd) => cmd.into_frame(),
            Command::ListIssues(cmd) => cmd.into_frame(),
            Command::FindIssue(cmd) => cmd.into_frame(),
            Command::Comment(cmd) => cmd.into_frame(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Register(_) => "register",
            Command::Login(_) => "login",
            Command::Logout(_) => "logout",
            Command::CreateProject(_) => "project",
            Command::FileIssue(_) => "issue",
            Command::ResolveIssue(_) => "resolve",
            Command::ListIssues(_) => "list",
            Command::FindIssue(_) => "find",
            Command::Comment(_) => "comment",
        }
    }

    /// Everything except the account commands needs a logged-in session.
    pub fn requires_login(&self) -> bool {
        !matches!(
            self,
            Command::Register(_) | Command::Login(_) | Command::Logout(_)
        )
    }

    /// Runs the command on behalf of `session`. Business-rule failures come
    /// back as an unsuccessful [`Outcome`]; only collaborator failures are
    /// errors.
    pub fn execute(self, session: &mut Session, backend: &Backend) -> crate::Result<Outcome> {
        if self.requires_login() && !session.is_authenticated() {
            return Ok(Outcome::failure(NOT_LOGGED_IN));
        }

        let username = session.username().unwrap_or_default().to_string();

        match self {
            Command::Register(cmd) => cmd.execute(session, backend),
            Command::Login(cmd) => cmd.execute(session, backend),
            Command::Logout(cmd) => Ok(cmd.execute(session)),
            Command::CreateProject(cmd) => cmd.execute(backend),
            Command::FileIssue(cmd) => cmd.execute(&username, backend),
            Command::ResolveIssue(cmd) => cmd.execute(backend),
            Command::ListIssues(cmd) => cmd.execute(backend),
            Command::FindIssue(cmd) => cmd.execute(backend),
            Command::Comment(cmd) => cmd.execute(&username, backend),
        }
    }
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Outcome {
        Outcome {
            message: message.into(),
            success: true,
        }
    }

    pub fn failure(message: impl Into<String>) -> Outcome {
        Outcome {
            message: message.into(),
            success: false,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Backend {
    pub fn new(store: Arc<dyn Store>, credentials: Arc<dyn Credentials>) -> Backend {
        Backend { store, credentials }
    }
}
