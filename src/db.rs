use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::model::{Comment, Issue, Project, User};

/// Storage collaborator the commands run against.
///
/// Inserts are conditional: the uniqueness check and the write happen as one
/// step, so two sessions racing on the same key cannot both succeed.
pub trait Store: Send + Sync {
    fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    fn insert_user(&self, user: User) -> Result<Inserted, StoreError>;

    fn find_project(&self, name: &str) -> Result<Option<Project>, StoreError>;

    fn insert_project(&self, project: Project) -> Result<Inserted, StoreError>;

    fn find_issue(&self, project: &str, title: &str) -> Result<Option<Issue>, StoreError>;

    fn insert_issue(&self, issue: Issue) -> Result<Inserted, StoreError>;

    /// Flips `resolved` from `false` to `true`; never the other way.
    fn resolve_issue(&self, project: &str, title: &str) -> Result<Resolution, StoreError>;

    /// Issues of one project in the order they were filed.
    fn list_issues(&self, project: &str) -> Result<Vec<Issue>, StoreError>;

    fn insert_comment(&self, comment: Comment) -> Result<(), StoreError>;

    /// Comments of one issue in the order they were added.
    fn list_comments(&self, project: &str, title: &str) -> Result<Vec<Comment>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    Created,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved,
    AlreadyResolved,
    Missing,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("journal i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("journal record could not be encoded: {0}")]
    Json(#[from] serde_json::Error),

    #[error("journal {path} is corrupt at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

/// In-memory tables, optionally backed by an append-only journal file.
///
/// Every mutation is appended to the journal and synced before it becomes
/// visible in memory; opening an existing journal replays it.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    tables: Tables,
    journal: Option<Box<dyn Journal>>,
}

/// Append target for committed records.
trait Journal: Write + Send {
    fn len(&self) -> io::Result<u64>;

    fn sync(&mut self) -> io::Result<()>;

    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Journal for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    projects: HashMap<String, Project>,
    issues: Vec<Issue>,
    issue_index: HashMap<(String, String), usize>,
    comments: Vec<Comment>,
}

/// One journal line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    User(User),
    Project(Project),
    Issue(Issue),
    Resolve { project: String, title: String },
    Comment(Comment),
}

impl Db {
    pub fn in_memory() -> Db {
        Db::with(Tables::default(), None)
    }

    /// Opens (creating if needed) the journal at `path` and rebuilds the
    /// tables from it.
    ///
    /// A final line without its newline is an append that never completed; it
    /// is cut off so later records start on a fresh line.
    pub fn open(path: impl AsRef<Path>) -> Result<Db, StoreError> {
        let path = path.as_ref();

        let mut journal = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let (tables, complete) = Db::rehydrate_from_disk(path, &journal)?;

        let size = Journal::len(&journal)?;
        if complete < size {
            warn!(
                path = %path.display(),
                dropped_bytes = size - complete,
                "journal ends in a torn record, truncating"
            );
            Journal::truncate(&mut journal, complete)?;
        }

        info!(
            path = %path.display(),
            users = tables.users.len(),
            projects = tables.projects.len(),
            issues = tables.issues.len(),
            comments = tables.comments.len(),
            "journal replayed"
        );

        Ok(Db::with(tables, Some(Box::new(journal))))
    }

    fn with(tables: Tables, journal: Option<Box<dyn Journal>>) -> Db {
        Db {
            inner: Arc::new(Mutex::new(Inner { tables, journal })),
        }
    }

    /// Replays every newline-terminated record. Also returns the byte length
    /// of that complete prefix.
    fn rehydrate_from_disk(path: &Path, journal: &File) -> Result<(Tables, u64), StoreError> {
        let mut reader = BufReader::new(journal);
        let mut tables = Tables::default();
        let mut line = String::new();
        let mut complete = 0;
        let mut number = 0;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;

            if read == 0 || !line.ends_with('\n') {
                break;
            }
            number += 1;

            if !line.trim().is_empty() {
                let record: Record =
                    serde_json::from_str(&line).map_err(|err| StoreError::Corrupt {
                        path: path.to_path_buf(),
                        line: number,
                        reason: err.to_string(),
                    })?;

                tables.apply(record);
            }

            complete += read as u64;
        }

        Ok((tables, complete))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl Inner {
    /// Runs on the calling worker with the lock held; once it returns the
    /// record is synced to the journal.
    fn commit(&mut self, record: Record) -> Result<(), StoreError> {
        if let Some(journal) = self.journal.as_mut() {
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');

            append_synced(&mut **journal, line.as_bytes())?;
        }

        self.tables.apply(record);

        Ok(())
    }
}

/// Writes and syncs `bytes`, cutting the journal back to its previous length
/// if either step fails.
fn append_synced(journal: &mut dyn Journal, bytes: &[u8]) -> io::Result<()> {
    let len = journal.len()?;

    let written = journal.write_all(bytes).and_then(|()| journal.sync());

    if let Err(err) = written {
        if let Err(undo) = journal.truncate(len) {
            error!(%undo, "journal could not be rolled back after a failed append");
        }
        return Err(err);
    }

    Ok(())
}

impl Tables {
    fn apply(&mut self, record: Record) {
        match record {
            Record::User(user) => {
                self.users.insert(user.username.clone(), user);
            }
            Record::Project(project) => {
                self.projects.insert(project.name.clone(), project);
            }
            Record::Issue(issue) => {
                let key = (issue.project.clone(), issue.title.clone());
                self.issue_index.insert(key, self.issues.len());
                self.issues.push(issue);
            }
            Record::Resolve { project, title } => {
                if let Some(&idx) = self.issue_index.get(&(project, title)) {
                    self.issues[idx].resolved = true;
                }
            }
            Record::Comment(comment) => {
                self.comments.push(comment);
            }
        }
    }

    fn issue(&self, project: &str, title: &str) -> Option<&Issue> {
        self.issue_index
            .get(&(project.to_string(), title.to_string()))
            .map(|&idx| &self.issues[idx])
    }
}

impl Store for Db {
    fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.tables.users.get(username).cloned())
    }

    fn insert_user(&self, user: User) -> Result<Inserted, StoreError> {
        let mut inner = self.lock()?;

        if inner.tables.users.contains_key(&user.username) {
            return Ok(Inserted::Duplicate);
        }

        inner.commit(Record::User(user))?;
        Ok(Inserted::Created)
    }

    fn find_project(&self, name: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.lock()?.tables.projects.get(name).cloned())
    }

    fn insert_project(&self, project: Project) -> Result<Inserted, StoreError> {
        let mut inner = self.lock()?;

        if inner.tables.projects.contains_key(&project.name) {
            return Ok(Inserted::Duplicate);
        }

        inner.commit(Record::Project(project))?;
        Ok(Inserted::Created)
    }

    fn find_issue(&self, project: &str, title: &str) -> Result<Option<Issue>, StoreError> {
        Ok(self.lock()?.tables.issue(project, title).cloned())
    }

    fn insert_issue(&self, issue: Issue) -> Result<Inserted, StoreError> {
        let mut inner = self.lock()?;

        if inner.tables.issue(&issue.project, &issue.title).is_some() {
            return Ok(Inserted::Duplicate);
        }

        inner.commit(Record::Issue(issue))?;
        Ok(Inserted::Created)
    }

    fn resolve_issue(&self, project: &str, title: &str) -> Result<Resolution, StoreError> {
        let mut inner = self.lock()?;

        match inner.tables.issue(project, title) {
            None => return Ok(Resolution::Missing),
            Some(issue) if issue.resolved => return Ok(Resolution::AlreadyResolved),
            Some(_) => {}
        }

        inner.commit(Record::Resolve {
            project: project.to_string(),
            title: title.to_string(),
        })?;
        Ok(Resolution::Resolved)
    }

    fn list_issues(&self, project: &str) -> Result<Vec<Issue>, StoreError> {
        let inner = self.lock()?;

        Ok(inner
            .tables
            .issues
            .iter()
            .filter(|issue| issue.project == project)
            .cloned()
            .collect())
    }

    fn insert_comment(&self, comment: Comment) -> Result<(), StoreError> {
        self.lock()?.commit(Record::Comment(comment))
    }

    fn list_comments(&self, project: &str, title: &str) -> Result<Vec<Comment>, StoreError> {
        let inner = self.lock()?;

        Ok(inner
            .tables
            .comments
            .iter()
            .filter(|comment| comment.project == project && comment.title == title)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            username: name.to_string(),
            password_hash: format!("hash-of-{name}"),
        }
    }

    fn project(name: &str) -> Project {
        Project {
            name: name.to_string(),
        }
    }

    fn comment(project: &str, title: &str, content: &str) -> Comment {
        Comment {
            project: project.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            commenter: "bob".to_string(),
        }
    }

    #[test]
    fn duplicate_user_is_refused() {
        let db = Db::in_memory();

        assert_eq!(db.insert_user(user("alice")).unwrap(), Inserted::Created);
        assert_eq!(db.insert_user(user("alice")).unwrap(), Inserted::Duplicate);
        assert_eq!(db.find_user("alice").unwrap(), Some(user("alice")));
        assert_eq!(db.find_user("bob").unwrap(), None);
    }

    #[test]
    fn issue_titles_are_unique_per_project_only() {
        let db = Db::in_memory();

        let first = Issue::new("P1", "alice", "T1", "one");
        assert_eq!(db.insert_issue(first.clone()).unwrap(), Inserted::Created);
        assert_eq!(
            db.insert_issue(Issue::new("P1", "bob", "T1", "two")).unwrap(),
            Inserted::Duplicate
        );
        assert_eq!(
            db.insert_issue(Issue::new("P2", "bob", "T1", "two")).unwrap(),
            Inserted::Created
        );

        assert_eq!(db.find_issue("P1", "T1").unwrap(), Some(first));
    }

    #[test]
    fn resolve_only_moves_forward() {
        let db = Db::in_memory();
        db.insert_issue(Issue::new("P1", "alice", "T1", "")).unwrap();

        assert_eq!(db.resolve_issue("P1", "T1").unwrap(), Resolution::Resolved);
        assert_eq!(db.resolve_issue("P1", "T1").unwrap(), Resolution::AlreadyResolved);
        assert_eq!(db.resolve_issue("P1", "T2").unwrap(), Resolution::Missing);
        assert!(db.find_issue("P1", "T1").unwrap().unwrap().resolved);
    }

    #[test]
    fn lists_keep_insertion_order_and_filter() {
        let db = Db::in_memory();
        for title in ["b", "a", "c"] {
            db.insert_issue(Issue::new("P1", "alice", title, "")).unwrap();
        }
        db.insert_issue(Issue::new("P2", "alice", "z", "")).unwrap();
        db.insert_comment(comment("P1", "a", "first")).unwrap();
        db.insert_comment(comment("P1", "b", "elsewhere")).unwrap();
        db.insert_comment(comment("P1", "a", "second")).unwrap();

        let titles: Vec<_> = db
            .list_issues("P1")
            .unwrap()
            .into_iter()
            .map(|issue| issue.title)
            .collect();
        assert_eq!(titles, ["b", "a", "c"]);

        let contents: Vec<_> = db
            .list_comments("P1", "a")
            .unwrap()
            .into_iter()
            .map(|comment| comment.content)
            .collect();
        assert_eq!(contents, ["first", "second"]);
        assert!(db.list_issues("P3").unwrap().is_empty());
    }

    #[test]
    fn journal_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.jsonl");

        {
            let db = Db::open(&path).unwrap();
            db.insert_user(user("alice")).unwrap();
            db.insert_project(project("P1")).unwrap();
            db.insert_issue(Issue::new("P1", "alice", "T1", "desc")).unwrap();
            db.resolve_issue("P1", "T1").unwrap();
            db.insert_comment(comment("P1", "T1", "done")).unwrap();
        }

        let db = Db::open(&path).unwrap();
        assert_eq!(db.find_user("alice").unwrap(), Some(user("alice")));
        assert_eq!(db.insert_project(project("P1")).unwrap(), Inserted::Duplicate);
        assert!(db.find_issue("P1", "T1").unwrap().unwrap().resolved);
        assert_eq!(db.list_comments("P1", "T1").unwrap().len(), 1);
    }

    #[test]
    fn refused_inserts_are_not_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.jsonl");

        let db = Db::open(&path).unwrap();
        db.insert_project(project("P1")).unwrap();
        db.insert_project(project("P1")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(contents.trim(), r#"{"kind":"project","name":"P1"}"#);
    }

    #[test]
    fn torn_tail_is_dropped_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.jsonl");

        Db::open(&path).unwrap().insert_project(project("P1")).unwrap();
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(br#"{"kind":"project","na"#)
            .unwrap();

        let db = Db::open(&path).unwrap();
        assert_eq!(db.find_project("P1").unwrap(), Some(project("P1")));
        db.insert_project(project("P2")).unwrap();
        drop(db);

        let db = Db::open(&path).unwrap();
        assert_eq!(db.find_project("P2").unwrap(), Some(project("P2")));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    /// In-memory journal that accepts `budget` bytes and then fails.
    struct Flaky {
        bytes: Arc<Mutex<Vec<u8>>>,
        budget: usize,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("no space left"));
            }

            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.bytes.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Journal for Flaky {
        fn len(&self) -> io::Result<u64> {
            Ok(self.bytes.lock().unwrap().len() as u64)
        }

        fn sync(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.bytes.lock().unwrap().truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn failed_append_is_rolled_back() {
        let first = serde_json::to_string(&Record::User(user("alice"))).unwrap() + "\n";
        let bytes = Arc::new(Mutex::new(Vec::new()));
        let journal = Flaky {
            bytes: bytes.clone(),
            budget: first.len() + 10,
        };
        let db = Db::with(Tables::default(), Some(Box::new(journal)));

        assert_eq!(db.insert_user(user("alice")).unwrap(), Inserted::Created);
        assert!(matches!(db.insert_user(user("bob")), Err(StoreError::Io(_))));

        assert_eq!(db.find_user("bob").unwrap(), None);
        assert_eq!(*bytes.lock().unwrap(), first.into_bytes());
    }

    #[test]
    fn corrupt_journal_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.jsonl");
        std::fs::write(&path, "{\"kind\":\"project\",\"name\":\"P1\"}\nnot json\n").unwrap();

        match Db::open(&path) {
            Err(StoreError::Corrupt { line, .. }) => assert_eq!(line, 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("corrupt journal was accepted"),
        }
    }
}
