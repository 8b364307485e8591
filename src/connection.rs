use bytes::{Bytes, BytesMut};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream,
};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::encode::{ToArg, ToRedis};
use crate::frame::{self, ArrayStack, DataType, Frame, Header, CRLF};
use crate::{Error, Result};

/// A RESP connection over an already-open byte stream.
///
/// Writes land in a write buffer and only reach the stream on [`Connection::flush`], so several
/// requests can be pipelined before a single flush. Replies are read one value at a time in the
/// order the server sends them; pairing replies with requests is up to the caller.
///
/// Every I/O method takes `&mut self`, so a connection has one writer and one reader at a time.
/// If any read fails with something other than [`Error::Server`], or a read future is dropped
/// before it completes, the byte position in the stream is lost and the connection must be closed.
pub struct Connection<S> {
    id: Uuid,
    // Data is read from the socket into the read buffer and written through the write buffer.
    stream: BufStream<S>,
    config: Config,
    // Number of requests written.
    count: u64,
    closed: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Connection<S> {
        Connection::with_config(stream, Config::default())
    }

    /// Alias of [`Connection::new`].
    pub fn client(stream: S) -> Connection<S> {
        Connection::new(stream)
    }

    pub fn with_config(stream: S, config: Config) -> Connection<S> {
        let stream =
            BufStream::with_capacity(config.buffer_capacity, config.buffer_capacity, stream);

        Connection {
            id: Uuid::new_v4(),
            stream,
            config,
            count: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of requests written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn stream(&self) -> &S {
        self.stream.get_ref()
    }

    /// Unwraps the stream. Anything still buffered, in either direction, is lost.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Flushes buffered writes and shuts the stream down. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        debug!(connection_id = %self.id, requests = self.count, "closing connection");
        self.stream.shutdown().await?;
        self.closed = true;

        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await?;
        Ok(())
    }

    /// Writes a command as an array of bulk strings, e.g. `["SET", "key", "value"]` becomes
    /// `*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n`.
    ///
    /// Arguments are always sent in their textual form, never as nested values. Nothing is
    /// flushed.
    pub async fn write_request<A: ToArg>(&mut self, arguments: &[A]) -> Result<()> {
        let mut buf = BytesMut::new();
        frame::put_line(&mut buf, DataType::Array, arguments.len().to_string().as_bytes());
        for argument in arguments {
            frame::put_bulk(&mut buf, &argument.to_arg());
        }

        self.count += 1;
        debug!(
            connection_id = %self.id,
            arguments = arguments.len(),
            bytes = buf.len(),
            count = self.count,
            "writing request"
        );

        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Writes any value that converts to a frame. Nothing is flushed.
    pub async fn write_object<T: ToRedis + ?Sized>(&mut self, object: &T) -> Result<()> {
        let frame = object.to_redis()?;

        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        trace!(connection_id = %self.id, bytes = buf.len(), "writing object");

        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Reads one complete value.
    ///
    /// Bulk strings and arrays declared with length `-1` both come back as [`Frame::Null`]. An
    /// error reply is returned as [`Error::Server`]. This never yields [`Frame::Error`]. When an
    /// array holds error replies (e.g. an `EXEC` reply), the whole array is still read so the next
    /// reply starts where it should, and the first error is returned.
    pub async fn read_object(&mut self) -> Result<Frame> {
        let mut arrays = ArrayStack::new(self.config.max_depth);
        let mut server_error: Option<String> = None;

        loop {
            let frame = match self.read_header().await? {
                Header::Value(Frame::Error(message)) => {
                    server_error.get_or_insert_with(|| message.clone());
                    Frame::Error(message)
                }
                Header::Value(frame) => frame,
                Header::Array(0) => Frame::Array(Vec::new()),
                Header::Array(expected) => {
                    // Don't trust the declared count for the up-front allocation.
                    arrays.open(expected, expected.min(1024))?;
                    continue;
                }
            };

            if let Some(frame) = arrays.push(frame) {
                if let Some(message) = server_error {
                    debug!(connection_id = %self.id, %message, "read error reply");
                    return Err(Error::Server(message));
                }
                debug!(connection_id = %self.id, "read object");
                return Ok(frame);
            }
        }
    }

    pub async fn read_response(&mut self) -> Result<Frame> {
        self.read_object().await
    }

    /// Writes a request, flushes it and reads its reply.
    pub async fn call<A: ToArg>(&mut self, arguments: &[A]) -> Result<Frame> {
        self.write_request(arguments).await?;
        self.flush().await?;
        self.read_response().await
    }

    /// Reads one line and everything that follows it, except for array elements.
    async fn read_header(&mut self) -> Result<Header> {
        let mut line = self.read_line().await?;

        let token = line.first().copied();
        let data_type = match token.map(DataType::try_from) {
            Some(Ok(data_type)) => data_type,
            parsed => {
                warn!(connection_id = %self.id, ?token, "unknown token, stream out of sync");
                // Best effort, the unknown token is what gets reported.
                let _ = self.stream.flush().await;
                return Err(match parsed {
                    Some(Err(err)) => err,
                    _ => Error::Protocol("missing type marker".to_string()),
                });
            }
        };
        line.remove(0);

        match data_type {
            DataType::BulkString => {
                match frame::parse_length(&line, self.config.max_bulk_length)? {
                    Some(length) => {
                        let data = self.read_data(length).await?;
                        Ok(Header::Value(Frame::Bulk(data)))
                    }
                    None => Ok(Header::Value(Frame::Null)),
                }
            }
            // Null array (https://redis.io/docs/reference/protocol-spec/#null-arrays)
            DataType::Array => match frame::parse_length(&line, usize::MAX)? {
                Some(count) => Ok(Header::Array(count)),
                None => Ok(Header::Value(Frame::Null)),
            },
            DataType::Integer => Ok(Header::Value(Frame::Integer(frame::parse_integer(&line)?))),
            DataType::SimpleString => Ok(Header::Value(Frame::Simple(String::from_utf8(line)?))),
            DataType::SimpleError => Ok(Header::Value(Frame::Error(String::from_utf8(line)?))),
        }
    }

    /// Reads a line up to and including CRLF, returning it without the terminator.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let max = self.config.max_line_length + CRLF.len();
        let mut line = Vec::new();

        loop {
            let limit = max.saturating_sub(line.len());
            if limit == 0 {
                return Err(Error::Protocol(format!(
                    "line exceeds the limit of {} bytes",
                    self.config.max_line_length
                )));
            }

            // A lone LF is part of the line, keep reading until it's preceded by CR.
            let n = (&mut self.stream)
                .take(limit as u64)
                .read_until(b'\n', &mut line)
                .await?;
            if n == 0 {
                return Err(Error::EndOfStream);
            }
            if line.ends_with(CRLF) {
                line.truncate(line.len() - CRLF.len());
                trace!(connection_id = %self.id, length = line.len(), "read line");
                return Ok(line);
            }
        }
    }

    /// Reads a bulk payload and the CRLF after it. The terminator is not checked, the declared
    /// length alone delimits the payload.
    async fn read_data(&mut self, length: usize) -> Result<Bytes> {
        let mut data = BytesMut::zeroed(length);
        self.stream.read_exact(&mut data).await?;

        let mut terminator = [0u8; 2];
        self.stream.read_exact(&mut terminator).await?;

        Ok(data.freeze())
    }
}
