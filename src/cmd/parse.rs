use std::vec;

use crate::frame::Frame;

/// Cursor over the arguments of one decoded request line.
///
/// Callers check the argument count with [`Parse::expect_args`] before
/// pulling fields, so a short or long line is reported instead of read past.
#[derive(Debug)]
pub(crate) struct Parse {
    command: String,
    parts: vec::IntoIter<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no command provided")]
    NoCommandProvided,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' takes {expected} argument(s), got {found}")]
    Arity {
        command: String,
        expected: usize,
        found: usize,
    },

    #[error("missing argument")]
    EndOfStream,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

impl Parse {
    pub(crate) fn new(frame: Frame) -> Result<Parse, ParseError> {
        let mut parts = frame.into_fields().into_iter();

        let command = match parts.next() {
            Some(name) if !name.trim().is_empty() => name.trim().to_lowercase(),
            _ => return Err(ParseError::NoCommandProvided),
        };

        Ok(Parse { command, parts })
    }

    pub(crate) fn command(&self) -> &str {
        &self.command
    }

    pub(crate) fn expect_args(&self, expected: usize) -> Result<(), ParseError> {
        let found = self.parts.len();

        if found != expected {
            return Err(ParseError::Arity {
                command: self.command.clone(),
                expected,
                found,
            });
        }

        Ok(())
    }

    pub(crate) fn next_string(&mut self) -> Result<String, ParseError> {
        self.parts.next().ok_or(ParseError::EndOfStream)
    }

    /// Like `next_string`, for fields that act as keys and so cannot be blank.
    pub(crate) fn next_identifier(&mut self, what: &'static str) -> Result<String, ParseError> {
        let value = self.next_string()?;

        if value.trim().is_empty() {
            return Err(ParseError::EmptyField(what));
        }

        Ok(value)
    }

    pub(crate) fn finish(&mut self) -> Result<(), ParseError> {
        match self.parts.len() {
            0 => Ok(()),
            extra => Err(ParseError::Arity {
                command: self.command.clone(),
                expected: 0,
                found: extra,
            }),
        }
    }
}
