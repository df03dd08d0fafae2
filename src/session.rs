/// Authentication state of one connection.
///
/// Owned by that connection's handler and never shared, so one client
/// logging in or out cannot affect any other.
#[derive(Debug)]
pub struct Session {
    id: u64,
    state: State,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Anonymous,
    Authenticated(String),
}

impl Session {
    pub fn new(id: u64) -> Session {
        Session {
            id,
            state: State::Anonymous,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn username(&self) -> Option<&str> {
        match &self.state {
            State::Authenticated(username) => Some(username),
            State::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username().is_some()
    }

    pub(crate) fn authenticate(&mut self, username: impl Into<String>) {
        self.state = State::Authenticated(username.into());
    }

    /// Returns the identity that was dropped, if any.
    pub(crate) fn logout(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, State::Anonymous) {
            State::Authenticated(username) => Some(username),
            State::Anonymous => None,
        }
    }
}
