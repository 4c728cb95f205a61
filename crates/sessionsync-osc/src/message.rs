//! OSC 1.0 message encoding and decoding
//!
//! A message is an address string, a type tag string starting with `,`, then
//! the arguments. Strings are NUL terminated and padded with NULs to a multiple
//! of 4 bytes; `i` and `f` arguments are 4-byte big-endian.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OscError {
    #[error("Packet truncated at offset {0}")]
    Truncated(usize),
    #[error("Packet length {0} is not a multiple of 4")]
    Misaligned(usize),
    #[error("Address must start with '/', got {0:?}")]
    InvalidAddress(String),
    #[error("Missing type tag string")]
    MissingTypeTags,
    #[error("Unsupported type tag '{0}'")]
    UnsupportedTag(char),
    #[error("String at offset {0} is not valid UTF-8")]
    InvalidString(usize),
}

/// A single OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl OscArg {
    fn tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
        }
    }
}

/// An OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Message with no arguments
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: OscArg) -> Self {
        self.args.push(arg);
        self
    }

    /// String arguments in order
    pub fn string_args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            OscArg::Str(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Encode to wire format; the result length is always a multiple of 4
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(padded_len(self.address.len()) + 8);
        write_padded_str(&mut packet, &self.address);

        let tags: String = std::iter::once(',')
            .chain(self.args.iter().map(OscArg::tag))
            .collect();
        write_padded_str(&mut packet, &tags);

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => packet.extend_from_slice(&v.to_be_bytes()),
                OscArg::Float(v) => packet.extend_from_slice(&v.to_be_bytes()),
                OscArg::Str(s) => write_padded_str(&mut packet, s),
            }
        }
        packet
    }

    /// Decode a single message (bundles are not supported)
    pub fn decode(data: &[u8]) -> Result<Self, OscError> {
        if data.len() % 4 != 0 {
            return Err(OscError::Misaligned(data.len()));
        }

        let (address, mut offset) = read_padded_str(data, 0)?;
        if !address.starts_with('/') {
            return Err(OscError::InvalidAddress(address));
        }

        if offset >= data.len() || data[offset] != b',' {
            return Err(OscError::MissingTypeTags);
        }
        let (tags, next) = read_padded_str(data, offset)?;
        offset = next;

        let mut args = Vec::with_capacity(tags.len() - 1);
        for tag in tags.chars().skip(1) {
            match tag {
                'i' => {
                    let bytes = read_word(data, offset)?;
                    args.push(OscArg::Int(i32::from_be_bytes(bytes)));
                    offset += 4;
                }
                'f' => {
                    let bytes = read_word(data, offset)?;
                    args.push(OscArg::Float(f32::from_be_bytes(bytes)));
                    offset += 4;
                }
                's' => {
                    let (s, next) = read_padded_str(data, offset)?;
                    args.push(OscArg::Str(s));
                    offset = next;
                }
                other => return Err(OscError::UnsupportedTag(other)),
            }
        }

        Ok(Self { address, args })
    }
}

/// Length of a string once NUL terminated and padded to 4 bytes
fn padded_len(len: usize) -> usize {
    (len / 4 + 1) * 4
}

fn write_padded_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    let padding = padded_len(s.len()) - s.len();
    buf.extend(std::iter::repeat(0u8).take(padding));
}

fn read_padded_str(data: &[u8], offset: usize) -> Result<(String, usize), OscError> {
    let rest = data.get(offset..).ok_or(OscError::Truncated(offset))?;
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(OscError::Truncated(data.len()))?;
    let s = std::str::from_utf8(&rest[..end])
        .map_err(|_| OscError::InvalidString(offset))?
        .to_string();
    let next = offset + padded_len(end);
    if next > data.len() {
        return Err(OscError::Truncated(data.len()));
    }
    Ok((s, next))
}

fn read_word(data: &[u8], offset: usize) -> Result<[u8; 4], OscError> {
    data.get(offset..offset + 4)
        .and_then(|w| w.try_into().ok())
        .ok_or(OscError::Truncated(offset))
}
