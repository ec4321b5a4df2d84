//! Framing of the requests and responses exchanged with remote nodes.
//!
//! Every message is a frame made of a 6-byte header followed by a payload:
//!
//! ```text
//! +---------+-----+-------------------+-----------------+
//! | version | tag | length (u32, BE)  | payload         |
//! +---------+-----+-------------------+-----------------+
//! ```
//!
//! The tag of a request is its [`Command`]; the tag of a response is its
//! [`Status`]. Times travel as decimal strings, `inf` standing for infinity.
//! A node-to-node transfer carries a port name prefixed by its length as a
//! big-endian `u16`, followed by the CBOR array of the transferred values.
use std::error::Error;
use std::fmt;
use std::io::{self, Read, Write};
use std::str;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::time::{format_time, parse_time};

/// Version of the frame layout.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest accepted payload.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 6;

/// A command sent to a remote node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Initialize the model at the time given in the payload.
    Initialize,
    /// Return the time of the next event of the model.
    TimeAdvance,
    /// Compute the outputs of the model at the time given in the payload.
    Lambda,
    /// Push the outputs of the model to the connected nodes.
    PropagateOutput,
    /// Append the values of a [`Transfer`] to an input port.
    PropagateOutputN2N,
    /// Run the transition of the model at the time given in the payload.
    Deltfcn,
    /// Empty all ports.
    Clear,
    /// Call the teardown hook of the model and stop serving.
    Exit,
}

impl Command {
    /// Returns the wire tag of the command.
    pub fn tag(self) -> u8 {
        match self {
            Self::Initialize => 2,
            Self::TimeAdvance => 3,
            Self::Lambda => 4,
            Self::PropagateOutput => 5,
            Self::PropagateOutputN2N => 6,
            Self::Deltfcn => 7,
            Self::Clear => 8,
            Self::Exit => 15,
        }
    }

    /// Returns the command with the given wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            2 => Some(Self::Initialize),
            3 => Some(Self::TimeAdvance),
            4 => Some(Self::Lambda),
            5 => Some(Self::PropagateOutput),
            6 => Some(Self::PropagateOutputN2N),
            7 => Some(Self::Deltfcn),
            8 => Some(Self::Clear),
            15 => Some(Self::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialize => "INITIALIZE",
            Self::TimeAdvance => "TIME_ADVANCE",
            Self::Lambda => "LAMBDA",
            Self::PropagateOutput => "PROPAGATE_OUTPUT",
            Self::PropagateOutputN2N => "PROPAGATE_OUTPUT_N2N",
            Self::Deltfcn => "DELTFCN",
            Self::Clear => "CLEAR",
            Self::Exit => "EXIT",
        };
        f.write_str(name)
    }
}

/// A request to a remote node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// The command to execute.
    pub command: Command,
    /// Command argument.
    pub payload: Bytes,
}

impl Request {
    /// Creates a request without argument.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            payload: Bytes::new(),
        }
    }

    /// Creates a request whose argument is a simulation time.
    pub fn at(command: Command, time: f64) -> Self {
        Self {
            command,
            payload: Bytes::from(format_time(time)),
        }
    }

    /// Creates a node-to-node transfer request.
    pub fn transfer(transfer: &Transfer) -> Result<Self, WireError> {
        Ok(Self {
            command: Command::PropagateOutputN2N,
            payload: transfer.encode()?,
        })
    }

    /// Parses the payload as a simulation time.
    pub fn time(&self) -> Result<f64, WireError> {
        let text = str::from_utf8(&self.payload).map_err(|_| WireError::InvalidUtf8)?;
        parse_time(text).ok_or_else(|| WireError::InvalidTime(text.to_string()))
    }

    /// Parses the payload as a node-to-node transfer.
    pub fn to_transfer(&self) -> Result<Transfer, WireError> {
        Transfer::decode(self.payload.clone())
    }
}

/// Values sent by a node to an input port of another node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    /// Name of the destination input port.
    pub port: String,
    /// CBOR array of the values.
    pub values: Bytes,
}

impl Transfer {
    fn encode(&self) -> Result<Bytes, WireError> {
        let name_len =
            u16::try_from(self.port.len()).map_err(|_| WireError::NameTooLong(self.port.len()))?;
        let mut buf = BytesMut::with_capacity(2 + self.port.len() + self.values.len());
        buf.put_u16(name_len);
        buf.put_slice(self.port.as_bytes());
        buf.put_slice(&self.values);

        Ok(buf.freeze())
    }

    fn decode(mut payload: Bytes) -> Result<Self, WireError> {
        if payload.remaining() < 2 {
            return Err(WireError::Truncated);
        }
        let name_len = payload.get_u16() as usize;
        if payload.remaining() < name_len {
            return Err(WireError::Truncated);
        }
        let name = payload.split_to(name_len);
        let port = str::from_utf8(&name)
            .map_err(|_| WireError::InvalidUtf8)?
            .to_string();

        Ok(Self {
            port,
            values: payload,
        })
    }
}

/// Outcome of a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// The request was executed.
    Ok,
    /// The request failed; the message describes the failure.
    Error,
}

impl Status {
    fn tag(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            _ => None,
        }
    }
}

/// A response from a remote node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Outcome of the request.
    pub status: Status,
    /// Acknowledgement, result or error description.
    pub message: String,
}

impl Response {
    /// Creates a successful response.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }
}

fn write_frame<W: Write>(writer: &mut W, tag: u8, payload: &[u8]) -> Result<(), WireError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(WireError::TooLarge(payload.len()));
    }
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u8(PROTOCOL_VERSION);
    frame.put_u8(tag);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    writer.write_all(&frame)?;
    writer.flush()?;

    Ok(())
}

fn read_frame<R: Read>(reader: &mut R) -> Result<(u8, Bytes), WireError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).map_err(truncated)?;
    let mut header = &header[..];

    let version = header.get_u8();
    if version != PROTOCOL_VERSION {
        return Err(WireError::Version(version));
    }
    let tag = header.get_u8();
    let len = header.get_u32() as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(WireError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(truncated)?;

    Ok((tag, Bytes::from(payload)))
}

fn truncated(e: io::Error) -> WireError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => WireError::Truncated,
        _ => WireError::Io(e),
    }
}

/// Writes a request frame.
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<(), WireError> {
    write_frame(writer, request.command.tag(), &request.payload)
}

/// Reads a request frame.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request, WireError> {
    let (tag, payload) = read_frame(reader)?;
    let command = Command::from_tag(tag).ok_or(WireError::UnknownTag(tag))?;

    Ok(Request { command, payload })
}

/// Writes a response frame.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<(), WireError> {
    write_frame(writer, response.status.tag(), response.message.as_bytes())
}

/// Reads a response frame.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response, WireError> {
    let (tag, payload) = read_frame(reader)?;
    let status = Status::from_tag(tag).ok_or(WireError::UnknownTag(tag))?;
    let message = String::from_utf8(payload.to_vec()).map_err(|_| WireError::InvalidUtf8)?;

    Ok(Response { status, message })
}

/// An error raised while encoding or decoding a frame.
#[derive(Debug)]
pub enum WireError {
    /// The connection failed.
    Io(io::Error),
    /// The frame was produced by another version of the protocol.
    Version(u8),
    /// The frame tag is not a known command or status.
    UnknownTag(u8),
    /// The frame or its payload ended prematurely.
    Truncated,
    /// The payload exceeds [`MAX_PAYLOAD_LEN`].
    TooLarge(usize),
    /// A port name does not fit the transfer header.
    NameTooLong(usize),
    /// A text payload is not valid UTF-8.
    InvalidUtf8,
    /// A time payload is not a number.
    InvalidTime(String),
    /// Port values could not be serialized or deserialized.
    Codec(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(fmt, "I/O error: {}", e),
            Self::Version(v) => write!(
                fmt,
                "unsupported protocol version {} (expected {})",
                v, PROTOCOL_VERSION
            ),
            Self::UnknownTag(tag) => write!(fmt, "unknown frame tag {}", tag),
            Self::Truncated => write!(fmt, "truncated frame"),
            Self::TooLarge(len) => write!(
                fmt,
                "payload of {} bytes exceeds the limit of {} bytes",
                len, MAX_PAYLOAD_LEN
            ),
            Self::NameTooLong(len) => write!(fmt, "port name of {} bytes is too long", len),
            Self::InvalidUtf8 => write!(fmt, "payload is not valid UTF-8"),
            Self::InvalidTime(text) => write!(fmt, "'{}' is not a valid time", text),
            Self::Codec(e) => write!(fmt, "value encoding error: {}", e),
        }
    }
}

impl Error for WireError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
