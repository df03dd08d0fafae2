use std::io::Cursor;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::frame::{self, Frame};

/// Line-oriented transport over one TCP stream. Reads are buffered until a
/// full line is available; every write is flushed before returning.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Waits for the next complete line. `None` means the peer closed the
    /// stream cleanly between lines.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err(crate::Error::ConnectionReset);
                }
            }
        }
    }

    fn parse_frame(&mut self) -> crate::Result<Option<Frame>> {
        use frame::Error::Incomplete;

        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(_) => {
                let len = buf.position() as usize;

                buf.set_position(0);

                let parsed = Frame::parse(&mut buf);

                self.buffer.advance(len);

                Ok(Some(parsed?))
            }
            Err(Incomplete) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> crate::Result<()> {
        let line = frame.encode()?;

        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Writes a free-form response sentence. Line breaks inside `message` are
    /// flattened so the reply always occupies exactly one line.
    pub async fn write_line(&mut self, message: &str) -> crate::Result<()> {
        let line = message.replace(['\r', '\n'], " ");

        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_u8(b'\n').await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Reads a response line verbatim, without splitting it into fields.
    pub async fn read_line(&mut self) -> crate::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line = self.buffer.split_to(pos + 1);
                let line = std::str::from_utf8(&line[..pos])
                    .map_err(frame::Error::from)?
                    .trim_end_matches('\r')
                    .to_string();

                return Ok(Some(line));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err(crate::Error::ConnectionReset);
                }
            }
        }
    }

    pub async fn shutdown(&mut self) -> crate::Result<()> {
        self.stream.shutdown().await?;

        Ok(())
    }
}
