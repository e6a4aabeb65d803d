// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Upper bound for the capacity reserved up front for an array. The declared element count comes
/// straight from the client, so it is never trusted for allocation.
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    #[error("protocol error; invalid length {0:?}")]
    InvalidLength(String),
    #[error("protocol error; bulk string is not terminated by CRLF")]
    InvalidTerminator,
    #[error("protocol error; nested arrays are not supported")]
    NestedArray,
    /// Invalid message encoding.
    #[error("{0}")]
    Other(crate::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    NullBulkString,
    NullArray,
    Array(Vec<Frame>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    /// Parses one frame that is not an array. On `Error::Incomplete` the caller retries from the
    /// start of the element once more data is buffered.
    fn parse_element(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let bytes = get_line(src)?.to_vec();
                let string = String::from_utf8(bytes)?;
                Ok(Frame::Simple(string))
            }
            DataType::SimpleError => {
                let bytes = get_line(src)?.to_vec();
                let string = String::from_utf8(bytes)?;
                Ok(Frame::Error(string))
            }
            DataType::Integer => {
                let integer = get_integer(src)?;
                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = get_integer(src)?;

                if length == -1 {
                    return Ok(Frame::NullBulkString);
                }

                let length = to_length(length)?;

                // The payload is taken by its declared length, so it may contain any byte,
                // including CRLF.
                if src.remaining() < length + CRLF.len() {
                    return Err(Error::Incomplete);
                }

                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + length]);
                src.advance(length);

                if &src.chunk()[..CRLF.len()] != CRLF {
                    return Err(Error::InvalidTerminator);
                }
                src.advance(CRLF.len());

                Ok(Frame::Bulk(data))
            }
            DataType::Array => Err(Error::NestedArray),
        }
    }

    /// `+<text>\r\n`
    pub fn simple(text: impl Into<String>) -> Frame {
        Frame::Simple(text.into())
    }

    /// `-<text>\r\n`
    pub fn error(text: impl Into<String>) -> Frame {
        Frame::Error(text.into())
    }

    /// A bulk string, or the null bulk string when there is no value.
    pub fn bulk(value: Option<Bytes>) -> Frame {
        value.map_or(Frame::NullBulkString, Frame::Bulk)
    }

    /// An array of bulk strings, in iteration order.
    pub fn bulk_array<I>(items: I) -> Frame
    where
        I: IntoIterator<Item = Bytes>,
    {
        Frame::Array(items.into_iter().map(Frame::Bulk).collect())
    }

    pub fn write_to(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(u8::from(DataType::SimpleString));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.put_u8(u8::from(DataType::SimpleError));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.put_u8(u8::from(DataType::Integer));
                dst.put_slice(i.to_string().as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(bytes.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(bytes);
                dst.put_slice(CRLF);
            }
            Frame::NullBulkString => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(b"-1");
                dst.put_slice(CRLF);
            }
            Frame::NullArray => {
                dst.put_u8(u8::from(DataType::Array));
                dst.put_slice(b"-1");
                dst.put_slice(CRLF);
            }
            Frame::Array(arr) => {
                dst.put_u8(u8::from(DataType::Array));
                dst.put_slice(arr.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for frame in arr {
                    frame.write_to(dst);
                }
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.write_to(&mut bytes);
        bytes.to_vec()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::NullBulkString => write!(f, "$-1"),
            Frame::NullArray => write!(f, "*-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

/// Resumable parser for the frames of one stream. Array elements that were already complete are
/// kept between calls, so a request that arrives in many small reads is not parsed again from its
/// first byte on every read.
///
/// Requests are flat, so an array may only hold scalar frames. A nested array is rejected.
#[derive(Debug, Default, Clone)]
pub struct Parser {
    /// Offset of the first byte that is not part of `array` yet.
    position: usize,
    array: Option<PartialArray>,
}

#[derive(Debug, Clone)]
struct PartialArray {
    remaining: usize,
    frames: Vec<Frame>,
}

impl Parser {
    /// Parses the frame at the start of `src` and returns it with the number of bytes it spans.
    /// After `Error::Incomplete`, the next call must be given the same bytes followed by the newly
    /// read ones.
    pub fn parse(&mut self, src: &[u8]) -> Result<(Frame, usize), Error> {
        let mut cursor = Cursor::new(src);
        cursor.set_position(self.position as u64);

        match self.resume(&mut cursor) {
            Err(Error::Incomplete) => Err(Error::Incomplete),
            result => {
                *self = Parser::default();
                result.map(|frame| (frame, cursor.position() as usize))
            }
        }
    }

    fn resume(&mut self, src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        if self.array.is_none() {
            let start = src.position();
            if get_byte(src)? != u8::from(DataType::Array) {
                src.set_position(start);
                return Frame::parse_element(src);
            }

            // *<number-of-elements>\r\n<element-1>...<element-n>
            let length = match get_array_length(src)? {
                Some(length) => length,
                None => return Ok(Frame::NullArray),
            };

            self.position = src.position() as usize;
            self.array = Some(PartialArray {
                remaining: length,
                frames: Vec::with_capacity(length.min(MAX_PREALLOCATED_ELEMENTS)),
            });
        }

        if let Some(array) = self.array.as_mut() {
            while array.remaining > 0 {
                array.frames.push(Frame::parse_element(src)?);
                array.remaining -= 1;
                self.position = src.position() as usize;
            }
        }

        let frames = self
            .array
            .take()
            .map(|array| array.frames)
            .unwrap_or_default();
        Ok(Frame::Array(frames))
    }
}

/// Returns the bytes up to the next CRLF and moves the cursor past it. Only used for headers and
/// simple strings, which cannot contain CRLF.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let buf: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;

    let line_end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((line_end + CRLF.len()) as u64);

    Ok(&buf[start..line_end])
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    let string = std::str::from_utf8(line)
        .map_err(|_| Error::InvalidLength(String::from_utf8_lossy(line).into_owned()))?;

    string
        .parse::<i64>()
        .map_err(|_| Error::InvalidLength(string.to_string()))
}

/// Reads an array header count. `None` is the null array.
fn get_array_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    let length = get_integer(src)?;
    if length == -1 {
        return Ok(None);
    }
    to_length(length).map(Some)
}

fn to_length(length: i64) -> Result<usize, Error> {
    usize::try_from(length).map_err(|_| Error::InvalidLength(length.to_string()))
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
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

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        "protocol error; invalid frame format".into()
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        Error::Other(src.into())
    }
}
