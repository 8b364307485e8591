use std::io;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The stream ran dry before a whole line, payload or terminator was read. The connection is
    /// no longer usable.
    #[error("unexpected end of stream")]
    EndOfStream,
    /// An error reply (`-`) sent by the server, verbatim.
    #[error("{0}")]
    Server(String),
    /// The leading byte of a line is not a known RESP marker. The stream is out of sync.
    #[error("unknown token: {}", describe_token(.0))]
    UnknownToken(u8),
    #[error("cannot encode value: {0}")]
    Unencodable(String),
    #[error("protocol error; {0}")]
    Protocol(String),
    /// Not enough data is buffered to parse an entire frame. Only raised by the incremental parser.
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid configuration; {0}")]
    Config(String),
    #[error(transparent)]
    Io(io::Error),
}

fn describe_token(token: &u8) -> String {
    format!("{:?}", char::from(*token))
}

impl Error {
    /// Whether the connection can still be used after this error.
    ///
    /// Server errors leave the stream aligned on the next reply; everything else means bytes were
    /// lost or misread and the connection must be closed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Server(_) | Error::Unencodable(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::EndOfStream,
            _ => Error::Io(err),
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        Error::Protocol("invalid frame format".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_is_end_of_stream() {
        let err = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "early eof"));

        assert!(matches!(err, Error::EndOfStream));
    }

    #[test]
    fn other_io_errors_are_kept() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "broken"));

        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn display() {
        assert_eq!(
            Error::Server("ERR unknown command".to_string()).to_string(),
            "ERR unknown command"
        );
        assert_eq!(Error::UnknownToken(b'?').to_string(), "unknown token: '?'");
        assert_eq!(Error::EndOfStream.to_string(), "unexpected end of stream");
    }

    #[test]
    fn recoverable() {
        assert!(Error::Server("ERR".to_string()).is_recoverable());
        assert!(!Error::EndOfStream.is_recoverable());
        assert!(!Error::UnknownToken(b'?').is_recoverable());
    }
}
