use tokio::net::{TcpStream, ToSocketAddrs};

use crate::cmd::{
    Comment, CreateProject, FileIssue, FindIssue, ListIssues, Login, Logout, Register,
    ResolveIssue,
};
use crate::connection::Connection;
use crate::frame::Frame;

/// Speaks the request/response protocol over one connection. Every call
/// sends one line and waits for the one-line reply.
pub struct Client {
    connection: Connection,
    username: Option<String>,
}

impl Client {
    pub async fn connect<T: ToSocketAddrs>(addr: T) -> crate::Result<Client> {
        let socket = TcpStream::connect(addr).await?;
        let connection = Connection::new(socket);

        Ok(Client {
            connection,
            username: None,
        })
    }

    /// The user this client last saw a successful register or login for.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub async fn send(&mut self, frame: Frame) -> crate::Result<String> {
        self.connection.write_frame(&frame).await?;

        self.read_response().await
    }

    pub async fn register(&mut self, username: &str, password: &str) -> crate::Result<String> {
        let response = self.send(Register::new(username, password).into_frame()).await?;

        if response.starts_with("Registration successful") {
            self.username = Some(username.to_string());
        }

        Ok(response)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> crate::Result<String> {
        let response = self.send(Login::new(username, password).into_frame()).await?;

        if response.starts_with("Login successful") {
            self.username = Some(username.to_string());
        }

        Ok(response)
    }

    pub async fn logout(&mut self) -> crate::Result<String> {
        let response = self.send(Logout::new().into_frame()).await?;

        self.username = None;

        Ok(response)
    }

    pub async fn create_project(&mut self, name: &str) -> crate::Result<String> {
        self.send(CreateProject::new(name).into_frame()).await
    }

    pub async fn file_issue(
        &mut self,
        project: &str,
        title: &str,
        description: &str,
    ) -> crate::Result<String> {
        let reporter = self.username.clone().unwrap_or_default();
        let frame = FileIssue::new(project, reporter, title, description).into_frame();

        self.send(frame).await
    }

    pub async fn resolve_issue(&mut self, project: &str, title: &str) -> crate::Result<String> {
        self.send(ResolveIssue::new(project, title).into_frame()).await
    }

    pub async fn list_issues(&mut self, project: &str) -> crate::Result<String> {
        self.send(ListIssues::new(project).into_frame()).await
    }

    pub async fn find_issue(&mut self, project: &str, title: &str) -> crate::Result<String> {
        self.send(FindIssue::new(project, title).into_frame()).await
    }

    pub async fn comment(
        &mut self,
        project: &str,
        title: &str,
        content: &str,
    ) -> crate::Result<String> {
        let commenter = self.username.clone().unwrap_or_default();
        let frame = Comment::new(project, title, content, commenter).into_frame();

        self.send(frame).await
    }

    /// Asks the server to close the connection. No reply is expected.
    pub async fn disconnect(mut self) -> crate::Result<()> {
        self.connection.write_frame(&Frame::disconnect()).await
    }

    async fn read_response(&mut self) -> crate::Result<String> {
        match self.connection.read_line().await? {
            Some(line) => Ok(line),
            None => Err(crate::Error::ServerClosed),
        }
    }
}
