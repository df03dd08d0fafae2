use tracing::info;

use super::parse::Parse;
use super::{Backend, Outcome, ParseError, NOT_LOGGED_IN};
use crate::db::Inserted;
use crate::frame::Frame;
use crate::model::User;
use crate::session::Session;

/// Deliberately identical for unknown users and wrong passwords.
const LOGIN_FAILED: &str = "Login unsuccessful - invalid username/password";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Logout;

fn already_logged_in(session: &Session) -> Option<Outcome> {
    session
        .username()
        .map(|username| Outcome::failure(format!("You are already logged in as {username}")))
}

impl Register {
    pub fn new(username: impl ToString, password: impl ToString) -> Register {
        Register {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("register");

        frame.push_string(self.username);
        frame.push_string(self.password);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Register, ParseError> {
        parse.expect_args(2)?;

        let username = parse.next_identifier("username")?;
        let password = parse.next_string()?;

        Ok(Register { username, password })
    }

    pub fn execute(self, session: &mut Session, backend: &Backend) -> crate::Result<Outcome> {
        if let Some(refused) = already_logged_in(session) {
            return Ok(refused);
        }

        let taken = "Registration unsuccessful - username is not unique";

        if backend.store.find_user(&self.username)?.is_some() {
            return Ok(Outcome::failure(taken));
        }

        // Hashed between the lookup and the insert so the store lock is free
        // while argon2 runs.
        let user = User {
            username: self.username.clone(),
            password_hash: backend.credentials.hash(&self.password)?,
        };

        match backend.store.insert_user(user)? {
            Inserted::Created => {
                info!(session = session.id(), username = %self.username, "registered");
                session.authenticate(self.username.as_str());

                Ok(Outcome::success(format!(
                    "Registration successful. You are now logged in as {}",
                    self.username
                )))
            }
            Inserted::Duplicate => Ok(Outcome::failure(taken)),
        }
    }
}

impl Login {
    pub fn new(username: impl ToString, password: impl ToString) -> Login {
        Login {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::new("login");

        frame.push_string(self.username);
        frame.push_string(self.password);

        frame
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Login, ParseError> {
        parse.expect_args(2)?;

        let username = parse.next_identifier("username")?;
        let password = parse.next_string()?;

        Ok(Login { username, password })
    }

    pub fn execute(self, session: &mut Session, backend: &Backend) -> crate::Result<Outcome> {
        if let Some(refused) = already_logged_in(session) {
            return Ok(refused);
        }

        let verified = match backend.store.find_user(&self.username)? {
            Some(user) => backend
                .credentials
                .verify(&user.password_hash, &self.password),
            None => false,
        };

        if !verified {
            return Ok(Outcome::failure(LOGIN_FAILED));
        }

        info!(session = session.id(), username = %self.username, "logged in");
        session.authenticate(self.username.as_str());

        Ok(Outcome::success(format!(
            "Login successful as {}",
            self.username
        )))
    }
}

impl Logout {
    pub fn new() -> Logout {
        Logout
    }

    pub fn into_frame(self) -> Frame {
        Frame::new("logout")
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Logout, ParseError> {
        parse.expect_args(0)?;

        Ok(Logout)
    }

    pub fn execute(self, session: &mut Session) -> Outcome {
        match session.logout() {
            Some(username) => {
                info!(session = session.id(), %username, "logged out");
                Outcome::success("Successfully logged out")
            }
            None => Outcome::failure(NOT_LOGGED_IN),
        }
    }
}
