use std::io::Cursor;
use std::str::{self, Utf8Error};

use bytes::Buf;

use crate::{DISCONNECT, SEPARATOR};

/// Longest request line the server is willing to buffer.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// One request or response line split into its fields. The command name
/// occupies field 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    fields: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("stream ended early")]
    Incomplete,

    #[error("line exceeds {MAX_LINE_LEN} bytes")]
    TooLong,

    #[error("line is not valid utf-8")]
    InvalidUtf8(#[from] Utf8Error),

    #[error("field {0:?} contains a reserved sequence")]
    Reserved(String),
}

impl Error {
    /// Whether the offending line was consumed, so the stream is still in sync.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidUtf8(_) | Error::Reserved(_))
    }
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Frame {
        Frame {
            fields: vec![name.into()],
        }
    }

    pub fn disconnect() -> Frame {
        Frame::new(DISCONNECT)
    }

    pub fn push_string(&mut self, field: impl Into<String>) {
        self.fields.push(field.into());
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    pub fn is_disconnect(&self) -> bool {
        self.fields.len() == 1 && self.fields[0] == DISCONNECT
    }

    /// Splits a line on the separator. Never fails: arity and meaning are the
    /// dispatcher's concern.
    pub fn decode(line: &str) -> Frame {
        Frame {
            fields: line.split(SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// Joins the fields and terminates the line. Fields that would not survive
    /// a `decode` (separator or line breaks inside them) are rejected.
    pub fn encode(&self) -> Result<String, Error> {
        if let Some(bad) = self.fields.iter().find(|field| !is_encodable(field)) {
            return Err(Error::Reserved(bad.clone()));
        }

        let mut line = self.fields.join(SEPARATOR);
        line.push('\n');

        Ok(line)
    }

    /// Advances `src` past one complete line, or reports how far the buffer is
    /// from holding one.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), Error> {
        get_line(src).map(|_| ())
    }

    /// Reads one complete line from `src` and decodes it. The cursor is moved
    /// past the line even when its bytes are not valid utf-8.
    ///
    /// Field bytes are kept as sent; only the disconnect token tolerates
    /// surrounding whitespace.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        let line = get_line(src)?;
        let line = str::from_utf8(line)?;

        if line.trim() == DISCONNECT {
            return Ok(Frame::disconnect());
        }

        Ok(Frame::decode(line))
    }
}

fn is_encodable(field: &str) -> bool {
    !field.contains(SEPARATOR) && !field.contains(['\n', '\r'])
}

/// A "line" is everything up to the next `\n`; a preceding `\r` is dropped.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    match buf[start..].iter().position(|&b| b == b'\n') {
        Some(offset) => {
            let end = start + offset;
            src.set_position((end + 1) as u64);

            let line = &buf[start..end];
            Ok(line.strip_suffix(b"\r").unwrap_or(line))
        }
        None if src.remaining() > MAX_LINE_LEN => Err(Error::TooLong),
        None => Err(Error::Incomplete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(fields: &[&str]) -> Frame {
        let mut frame = Frame::new(fields[0]);
        for field in &fields[1..] {
            frame.push_string(*field);
        }
        frame
    }

    #[test]
    fn decode_splits_on_separator() {
        let frame = Frame::decode("issue|-|P1|-|alice|-|T1|-|desc");

        assert_eq!(frame.fields(), ["issue", "P1", "alice", "T1", "desc"]);
    }

    #[test]
    fn decode_keeps_empty_fields() {
        let frame = Frame::decode("comment|-|P1|-||-|");

        assert_eq!(frame.fields(), ["comment", "P1", "", ""]);
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        let frame = frame_of(&["find", "P1", "a title with | pipes and - dashes"]);
        let line = frame.encode().unwrap();

        assert!(line.ends_with('\n'));
        assert_eq!(Frame::decode(line.trim_end_matches('\n')), frame);
    }

    #[test]
    fn encode_rejects_separator_inside_field() {
        let frame = frame_of(&["project", "bad|-|name"]);

        assert!(matches!(frame.encode(), Err(Error::Reserved(field)) if field == "bad|-|name"));
    }

    #[test]
    fn encode_rejects_line_breaks() {
        assert!(frame_of(&["comment", "P1", "T1", "two\nlines", "u"]).encode().is_err());
        assert!(frame_of(&["comment", "P1", "T1", "cr\r", "u"]).encode().is_err());
    }

    #[test]
    fn disconnect_is_a_lone_token() {
        assert!(Frame::decode("disconnect").is_disconnect());
        assert!(!Frame::decode("disconnect|-|now").is_disconnect());
        assert_eq!(Frame::disconnect().encode().unwrap(), "disconnect\n");
    }

    #[test]
    fn check_waits_for_newline() {
        let data = b"list|-|P1";
        let mut buf = Cursor::new(&data[..]);

        assert!(matches!(Frame::check(&mut buf), Err(Error::Incomplete)));
    }

    #[test]
    fn parse_consumes_exactly_one_line() {
        let data = b"list|-|P1\r\nfind|-|P1|-|T1\n";
        let mut buf = Cursor::new(&data[..]);

        assert_eq!(Frame::parse(&mut buf).unwrap().fields(), ["list", "P1"]);
        assert_eq!(buf.position(), 11);
        assert_eq!(Frame::parse(&mut buf).unwrap().fields(), ["find", "P1", "T1"]);
        assert!(!buf.has_remaining());
    }

    #[test]
    fn disconnect_tolerates_padding() {
        let data = b"  disconnect \n";
        let mut buf = Cursor::new(&data[..]);

        assert!(Frame::parse(&mut buf).unwrap().is_disconnect());
    }

    #[test]
    fn parse_keeps_whitespace_inside_fields() {
        let frame = frame_of(&["issue", "P1", "alice", "T1", "  padded description   "]);
        let line = frame.encode().unwrap();
        let mut buf = Cursor::new(line.as_bytes());

        assert_eq!(Frame::parse(&mut buf).unwrap(), frame);
    }

    #[test]
    fn invalid_utf8_still_consumes_the_line() {
        let data = b"list|-|\xff\xfe\nlist|-|P1\n";
        let mut buf = Cursor::new(&data[..]);

        let err = Frame::parse(&mut buf).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(Frame::parse(&mut buf).unwrap().fields(), ["list", "P1"]);
    }

    #[test]
    fn oversized_line_is_rejected() {
        let data = vec![b'a'; MAX_LINE_LEN + 1];
        let mut buf = Cursor::new(&data[..]);

        let err = Frame::check(&mut buf).unwrap_err();
        assert!(matches!(err, Error::TooLong));
        assert!(!err.is_recoverable());
    }
}
