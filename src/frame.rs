// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

use crate::{Error, Result};

pub(crate) static CRLF: &[u8; 2] = b"\r\n";

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    /// Both the null bulk string (`$-1`) and the null array (`*-1`).
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Parses one frame from the buffered bytes, advancing the cursor past it.
    ///
    /// Returns `Error::Incomplete` when the buffer ends before the frame does. In that case the
    /// cursor position is meaningless and the caller should retry from the start once more data
    /// arrives. Error replies are returned as `Frame::Error` rather than raised. Arrays nested
    /// deeper than `max_depth` fail with `Error::Protocol`.
    pub fn parse(
        src: &mut Cursor<&[u8]>,
        max_bulk_length: usize,
        max_depth: usize,
    ) -> Result<Self> {
        let mut arrays = ArrayStack::new(max_depth);

        loop {
            let frame = match parse_header(src, max_bulk_length)? {
                Header::Value(frame) => frame,
                Header::Array(0) => Frame::Array(Vec::new()),
                Header::Array(expected) => {
                    // Every element takes at least three bytes, so the remaining buffer bounds
                    // the capacity worth reserving up front.
                    arrays.open(expected, expected.min(src.remaining() / 3))?;
                    continue;
                }
            };

            if let Some(frame) = arrays.push(frame) {
                return Ok(frame);
            }
        }
    }

    /// Appends the wire representation of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => put_line(dst, DataType::SimpleString, s.as_bytes()),
            Frame::Error(s) => put_line(dst, DataType::SimpleError, s.as_bytes()),
            Frame::Integer(i) => put_line(dst, DataType::Integer, i.to_string().as_bytes()),
            Frame::Bulk(bytes) => put_bulk(dst, bytes),
            Frame::Null => put_line(dst, DataType::BulkString, b"-1"),
            Frame::Array(arr) => {
                put_line(dst, DataType::Array, arr.len().to_string().as_bytes());
                for frame in arr {
                    frame.encode(dst);
                }
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.encode(&mut bytes);
        bytes.to_vec()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null)
    }

    /// Turns an error reply into `Error::Server`, passing every other frame through.
    pub fn into_result(self) -> Result<Frame> {
        match self {
            Frame::Error(message) => Err(Error::Server(message)),
            frame => Ok(frame),
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

// Renders frames the way redis-cli prints replies.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "{}", s),
            Frame::Error(s) => write!(f, "(error) {}", s),
            Frame::Integer(i) => write!(f, "(integer) {}", i),
            Frame::Bulk(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "(nil)"),
            Frame::Array(arr) if arr.is_empty() => write!(f, "(empty array)"),
            Frame::Array(arr) => {
                let width = arr.len().to_string().len();
                for (index, frame) in arr.iter().enumerate() {
                    if index > 0 {
                        writeln!(f)?;
                    }
                    let prefix = format!("{:>width$}) ", index + 1, width = width);
                    // Nested elements are indented under their parent's prefix.
                    let indent = format!("\n{:width$}", "", width = prefix.len());
                    let nested = frame.to_string().replace('\n', &indent);
                    write!(f, "{}{}", prefix, nested)?;
                }
                Ok(())
            }
        }
    }
}

/// One line of a value and whatever payload follows it. Array elements are not included.
pub(crate) enum Header {
    Value(Frame),
    Array(usize),
}

fn parse_header(src: &mut Cursor<&[u8]>, max_bulk_length: usize) -> Result<Header> {
    // The first byte in an RESP-serialized payload always identifies its type.
    // Subsequent bytes constitute the type's contents.
    let first_byte = get_byte(src)?;
    let data_type = DataType::try_from(first_byte)?;

    match data_type {
        DataType::SimpleString => {
            let line = get_line(src)?.to_vec();
            Ok(Header::Value(Frame::Simple(String::from_utf8(line)?)))
        }
        DataType::SimpleError => {
            let line = get_line(src)?.to_vec();
            Ok(Header::Value(Frame::Error(String::from_utf8(line)?)))
        }
        DataType::Integer => Ok(Header::Value(Frame::Integer(parse_integer(get_line(src)?)?))),
        // $<length>\r\n<data>\r\n
        DataType::BulkString => {
            let length = match parse_length(get_line(src)?, max_bulk_length)? {
                Some(length) => length,
                None => return Ok(Header::Value(Frame::Null)),
            };

            // The payload is binary-safe, its declared length is all that delimits it.
            if src.remaining() < length + CRLF.len() {
                return Err(Error::Incomplete);
            }
            let data = Bytes::copy_from_slice(&src.chunk()[..length]);
            src.advance(length + CRLF.len());

            Ok(Header::Value(Frame::Bulk(data)))
        }
        // *<number-of-elements>\r\n<element-1>...<element-n>
        DataType::Array => match parse_length(get_line(src)?, usize::MAX)? {
            Some(length) => Ok(Header::Array(length)),
            None => Ok(Header::Value(Frame::Null)),
        },
    }
}

struct PendingArray {
    expected: usize,
    items: Vec<Frame>,
}

/// Arrays whose elements are still being read, innermost last.
///
/// Nested arrays are assembled here instead of by recursion, and the nesting depth is capped so
/// that no frame handed out is deep enough to exhaust the stack when it's compared or dropped.
pub(crate) struct ArrayStack {
    arrays: Vec<PendingArray>,
    max_depth: usize,
}

impl ArrayStack {
    pub(crate) fn new(max_depth: usize) -> ArrayStack {
        ArrayStack {
            arrays: Vec::new(),
            max_depth,
        }
    }

    /// Starts an array of `expected` elements, `expected` must not be zero.
    pub(crate) fn open(&mut self, expected: usize, capacity: usize) -> Result<()> {
        if self.arrays.len() >= self.max_depth {
            return Err(Error::Protocol(format!(
                "arrays nested deeper than {} levels",
                self.max_depth
            )));
        }

        self.arrays.push(PendingArray {
            expected,
            items: Vec::with_capacity(capacity),
        });
        Ok(())
    }

    /// Adds a finished value to the innermost array, closing every array it completes. Returns
    /// the outermost value once nothing is left open.
    pub(crate) fn push(&mut self, mut frame: Frame) -> Option<Frame> {
        while let Some(mut parent) = self.arrays.pop() {
            parent.items.push(frame);
            if parent.items.len() < parent.expected {
                self.arrays.push(parent);
                return None;
            }
            frame = Frame::Array(parent.items);
        }
        Some(frame)
    }
}

/// RESP2 type markers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::UnknownToken(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}

pub(crate) fn put_line(dst: &mut BytesMut, data_type: DataType, payload: &[u8]) {
    dst.reserve(1 + payload.len() + CRLF.len());
    dst.put_u8(u8::from(data_type));
    dst.put_slice(payload);
    dst.put_slice(CRLF);
}

pub(crate) fn put_bulk(dst: &mut BytesMut, data: &[u8]) {
    put_line(dst, DataType::BulkString, data.len().to_string().as_bytes());
    dst.reserve(data.len() + CRLF.len());
    dst.put_slice(data);
    dst.put_slice(CRLF);
}

/// Parses a `:` payload. A leading `+` or `-` is accepted.
pub(crate) fn parse_integer(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::Protocol(format!(
                "invalid integer {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

/// Parses the length line of a bulk string or array. `-1` means null and yields `None`.
pub(crate) fn parse_length(line: &[u8], max: usize) -> Result<Option<usize>> {
    match parse_integer(line)? {
        -1 => Ok(None),
        length if length < 0 => Err(Error::Protocol(format!("invalid length {}", length))),
        length => {
            let length = usize::try_from(length)
                .map_err(|_| Error::Protocol(format!("invalid length {}", length)))?;
            if length > max {
                return Err(Error::Protocol(format!(
                    "length {} exceeds the limit of {} bytes",
                    length, max
                )));
            }
            Ok(Some(length))
        }
    }
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8]> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}
