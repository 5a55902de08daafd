//! The generic IPMI message envelope (v1.5 §12.4, v2.0 §13.8).
//!
//! Wire format (offsets in square brackets):
//!
//! ```text
//! [0]    remote address (LSB: 0 slave address, 1 software ID)
//! [1]    network function (top 6 bits) | remote LUN (low 2 bits)
//! [2]    checksum over [0..2]
//! [3]    local address
//! [4]    sequence (top 6 bits) | local LUN (low 2 bits)
//! [5]    command
//! [6]    completion code (responses only)
//! [..]   body code (Group) or 3-byte LE enterprise number (OEM)
//! [..]   payload
//! [last] checksum over [3..last]
//! ```
//!
//! One [`Message`] type serves both directions. For a request, `remote_*`
//! describes the responder and `local_*` the requester; for a response it is
//! the other way round. "Local" is therefore not always the remote console:
//! the BMC is entitled to send requests too. Use [`Message::is_request`] to
//! find out which way a message travels.

use core::fmt;

use crate::error::{Error, Result};
use crate::operation::{
    BodyCode, Enterprise, Extension, ExtensionKind, LayerType, NetworkFunction, Operation,
};

/// Shortest possible message: six header bytes and the trailing checksum.
pub const MIN_MESSAGE_LEN: usize = 7;

/// Two's-complement checksum: `sum(data) + checksum(data) ≡ 0 (mod 256)`.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    sum.wrapping_neg()
}

/// Which of the two message checksums a [`Error::Checksum`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumField {
    /// Covers remote address, network function and remote LUN.
    Checksum1,
    /// Covers everything from the local address to the end of the payload.
    Checksum2,
}

impl fmt::Display for ChecksumField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checksum1 => f.write_str("checksum1"),
            Self::Checksum2 => f.write_str("checksum2"),
        }
    }
}

/// A slave address or software ID.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(u8);

impl Address {
    /// The BMC's slave address (0x10 shifted into place).
    pub const BMC: Self = Self(0x20);
    /// Software ID conventionally used by remote consoles.
    pub const REMOTE_CONSOLE: Self = Self(0x81);

    /// Wrap a raw wire byte.
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw wire byte.
    pub const fn byte(self) -> u8 {
        self.0
    }

    /// Whether the address is a software ID rather than a slave address.
    pub const fn is_software_id(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// The 7-bit value without the type flag.
    pub const fn value(self) -> u8 {
        self.0 >> 1
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#04x})", self.0)
    }
}

/// 2-bit logical unit number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lun {
    /// BMC commands.
    #[default]
    Bmc = 0,
    /// OEM LUN 1.
    Oem1 = 1,
    /// SMS message LUN.
    Sms = 2,
    /// OEM LUN 2.
    Oem2 = 3,
}

impl Lun {
    /// Build from the low two bits of `bits`.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Bmc,
            1 => Self::Oem1,
            2 => Self::Sms,
            _ => Self::Oem2,
        }
    }

    /// The 2-bit wire value.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Response status byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompletionCode(pub u8);

impl CompletionCode {
    /// Command completed normally.
    pub const NORMAL: Self = Self(0x00);
    /// Node busy.
    pub const NODE_BUSY: Self = Self(0xC0);
    /// Invalid command.
    pub const INVALID_COMMAND: Self = Self(0xC1);
    /// Timeout while processing the command.
    pub const TIMEOUT: Self = Self(0xC3);
    /// Request data length invalid.
    pub const REQUEST_DATA_LENGTH_INVALID: Self = Self(0xC7);
    /// Insufficient privilege level.
    pub const INSUFFICIENT_PRIVILEGE: Self = Self(0xD4);
    /// Unspecified error.
    pub const UNSPECIFIED: Self = Self(0xFF);
    /// Close Session: invalid session ID.
    pub const INVALID_SESSION_ID: Self = Self(0x87);

    /// Whether the command completed normally.
    pub const fn is_normal(self) -> bool {
        self.0 == 0x00
    }
}

impl fmt::Debug for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompletionCode({:#04x})", self.0)
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match *self {
            Self::NORMAL => "normal",
            Self::NODE_BUSY => "node busy",
            Self::INVALID_COMMAND => "invalid command",
            Self::TIMEOUT => "timeout",
            Self::REQUEST_DATA_LENGTH_INVALID => "request data length invalid",
            Self::INSUFFICIENT_PRIVILEGE => "insufficient privilege",
            Self::UNSPECIFIED => "unspecified error",
            _ => return write!(f, "{:#04x}", self.0),
        };
        write!(f, "{:#04x} ({desc})", self.0)
    }
}

/// Serialization options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializeOptions {
    /// Recompute both checksums from the written bytes instead of trusting
    /// the values already in the message.
    pub compute_checksums: bool,
}

impl SerializeOptions {
    /// Recompute checksums while encoding.
    pub const COMPUTE_CHECKSUMS: Self = Self {
        compute_checksums: true,
    };
}

/// An IPMI message envelope framing an opaque command payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Network function, extension and command.
    pub operation: Operation,
    /// Responder for requests, requester for responses.
    pub remote_address: Address,
    /// LUN paired with `remote_address`.
    pub remote_lun: Lun,
    /// Checksum over the first two bytes.
    pub checksum1: u8,
    /// Requester for requests, responder for responses.
    pub local_address: Address,
    /// LUN paired with `local_address`.
    pub local_lun: Lun,
    /// 6-bit sequence number, mirrored by the responder.
    pub sequence: u8,
    /// Only meaningful when [`Message::is_request`] is false; always normal
    /// for requests.
    pub completion_code: CompletionCode,
    /// Checksum from the local address to the end of the payload.
    pub checksum2: u8,
    /// Command data following the header; may be empty.
    pub payload: Vec<u8>,
}

impl Message {
    /// A request from the remote console to the BMC (LUN 0 on both ends).
    pub fn request(operation: Operation, sequence: u8, payload: Vec<u8>) -> Self {
        Self {
            operation,
            remote_address: Address::BMC,
            remote_lun: Lun::Bmc,
            checksum1: 0,
            local_address: Address::REMOTE_CONSOLE,
            local_lun: Lun::Bmc,
            sequence: sequence & 0x3F,
            completion_code: CompletionCode::NORMAL,
            checksum2: 0,
            payload,
        }
    }

    /// Whether this message is a request. Decides whether the completion
    /// code is present on the wire.
    pub fn is_request(&self) -> bool {
        self.operation.function.is_request()
    }

    /// The completion code, or `None` for requests.
    pub fn completion(&self) -> Option<CompletionCode> {
        if self.is_request() {
            None
        } else {
            Some(self.completion_code)
        }
    }

    /// The layer that follows this envelope.
    ///
    /// A non-normal completion code always yields the opaque payload: bytes
    /// after it are device specific and never structurally parsed.
    pub fn next_layer(&self) -> LayerType {
        if !self.completion_code.is_normal() {
            return LayerType::Payload;
        }
        self.operation.next_layer()
    }

    /// Length of everything before the payload.
    pub fn header_len(&self) -> usize {
        header_len(self.operation.function)
    }

    /// Decode a message, verifying both checksums.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_MESSAGE_LEN {
            return Err(Error::Truncated("IPMI message must be at least 7 bytes"));
        }

        let remote_address = Address(data[0]);
        let function = NetworkFunction::new(data[1] >> 2);
        let remote_lun = Lun::from_bits(data[1]);
        let checksum1 = data[2];
        verify(ChecksumField::Checksum1, &data[..2], checksum1)?;

        let local_address = Address(data[3]);
        let sequence = data[4] >> 2;
        let local_lun = Lun::from_bits(data[4]);
        let command = data[5];

        let last = data.len() - 1;
        let checksum2 = data[last];
        verify(ChecksumField::Checksum2, &data[3..last], checksum2)?;

        let (completion_code, mut offset) = if function.is_request() {
            (CompletionCode::NORMAL, 6)
        } else {
            // The completion code must not be the trailing checksum itself.
            if last <= 6 {
                return Err(Error::Truncated("response is missing its completion code"));
            }
            (CompletionCode(data[6]), 7)
        };

        let kind = function.extension_kind();
        let ext_len = kind.wire_len();
        if last - offset < ext_len {
            return Err(match kind {
                ExtensionKind::Body => Error::Truncated("data too short for body code"),
                _ => Error::Truncated("data too short for OEM enterprise number"),
            });
        }
        let ext_bytes = &data[offset..offset + ext_len];
        let extension = match kind {
            ExtensionKind::None => Extension::None,
            ExtensionKind::Body => Extension::Body(BodyCode(ext_bytes[0])),
            ExtensionKind::Enterprise => Extension::Enterprise(Enterprise::from_le_bytes([
                ext_bytes[0],
                ext_bytes[1],
                ext_bytes[2],
            ])),
        };
        offset += ext_len;

        Ok(Self {
            operation: Operation {
                function,
                extension,
                command,
            },
            remote_address,
            remote_lun,
            checksum1,
            local_address,
            local_lun,
            sequence,
            completion_code,
            checksum2,
            payload: data[offset..last].to_vec(),
        })
    }

    /// Encode the message.
    ///
    /// With [`SerializeOptions::compute_checksums`] set, both checksum fields
    /// are updated from the written bytes so the message stays equal to what
    /// decoding the output yields.
    ///
    /// Fails with [`Error::InvalidArgument`] when the operation's extension
    /// does not match its network function, or when `sequence` does not fit
    /// in 6 bits.
    pub fn encode(&mut self, opts: SerializeOptions) -> Result<Vec<u8>> {
        if !self.operation.is_well_formed() {
            return Err(Error::InvalidArgument(
                "extension does not match network function",
            ));
        }
        if self.sequence > 0x3F {
            return Err(Error::InvalidArgument("sequence must be 6-bit"));
        }

        let header_len = self.header_len();
        let mut out = Vec::with_capacity(header_len + self.payload.len() + 1);

        out.push(self.remote_address.0);
        out.push((self.operation.function.code() << 2) | self.remote_lun.bits());
        if opts.compute_checksums {
            self.checksum1 = checksum(&out[..2]);
        }
        out.push(self.checksum1);

        out.push(self.local_address.0);
        out.push((self.sequence << 2) | self.local_lun.bits());
        out.push(self.operation.command);

        if !self.is_request() {
            out.push(self.completion_code.0);
        }
        match self.operation.extension {
            Extension::None => {}
            Extension::Body(body) => out.push(body.0),
            Extension::Enterprise(en) => out.extend_from_slice(&en.to_le_bytes()),
        }
        debug_assert_eq!(out.len(), header_len);

        out.extend_from_slice(&self.payload);

        // Covers everything from the local address onward, so it goes last.
        if opts.compute_checksums {
            self.checksum2 = checksum(&out[3..]);
        }
        out.push(self.checksum2);

        Ok(out)
    }
}

fn header_len(function: NetworkFunction) -> usize {
    let completion = usize::from(!function.is_request());
    6 + completion + function.extension_kind().wire_len()
}

fn verify(which: ChecksumField, covered: &[u8], actual: u8) -> Result<()> {
    let expected = checksum(covered);
    if actual != expected {
        return Err(Error::Checksum {
            which,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_get_device_id_request() {
        let mut msg = Message::request(Operation::GET_DEVICE_ID_REQ, 0, Vec::new());
        let bytes = msg.encode(SerializeOptions::COMPUTE_CHECKSUMS).expect("encode");
        assert_eq!(bytes, vec![0x20, 0x18, 0xC8, 0x81, 0x00, 0x01, 0x7E]);
        assert_eq!(msg.checksum1, 0xC8);
        assert_eq!(msg.checksum2, 0x7E);
    }

    #[test]
    fn out_of_range_sequence_is_rejected() {
        let mut msg = Message::request(Operation::GET_DEVICE_ID_REQ, 0x40, Vec::new());
        assert_eq!(msg.sequence, 0x00);

        msg.sequence = 0x40;
        assert!(matches!(
            msg.encode(SerializeOptions::COMPUTE_CHECKSUMS),
            Err(Error::InvalidArgument(_))
        ));

        msg.sequence = 0x3F;
        let bytes = msg.encode(SerializeOptions::COMPUTE_CHECKSUMS).expect("encode");
        assert_eq!(bytes[4], 0x3F << 2);
    }

    #[test]
    fn decodes_get_device_id_response() {
        let response = [
            0x81, 0x1C, 0x63, // rs_addr, netfn/lun, checksum1
            0x20, 0x00, 0x01, // rq_addr, rq_seq/lun, cmd
            0x00, // completion code
            0x20, 0x01, 0x02, // data
            0xBC, // checksum2
        ];

        let msg = Message::decode(&response).expect("decode");
        assert_eq!(msg.operation, Operation::GET_DEVICE_ID_RSP);
        assert_eq!(msg.completion(), Some(CompletionCode::NORMAL));
        assert_eq!(msg.payload, vec![0x20, 0x01, 0x02]);
        assert_eq!(msg.next_layer(), LayerType::GetDeviceIdRsp);
        assert!(!msg.local_address.is_software_id());
        assert!(msg.remote_address.is_software_id());
    }

    #[test]
    fn reports_which_checksum_failed() {
        let mut response = vec![
            0x81, 0x1C, 0x63, 0x20, 0x00, 0x01, 0x00, 0x20, 0x01, 0x02, 0xBC,
        ];
        response[7] ^= 0xFF;

        let err = Message::decode(&response).unwrap_err();
        assert!(matches!(
            err,
            Error::Checksum {
                which: ChecksumField::Checksum2,
                actual: 0xBC,
                ..
            }
        ));

        response[7] ^= 0xFF;
        response[2] = 0x00;
        let err = Message::decode(&response).unwrap_err();
        assert!(matches!(
            err,
            Error::Checksum {
                which: ChecksumField::Checksum1,
                expected: 0x63,
                actual: 0x00,
            }
        ));
    }

    #[test]
    fn non_normal_completion_code_is_opaque() {
        let mut msg = Message::request(Operation::GET_DEVICE_ID_RSP, 3, vec![0xDE, 0xAD]);
        msg.completion_code = CompletionCode::INVALID_COMMAND;
        let bytes = msg.encode(SerializeOptions::COMPUTE_CHECKSUMS).expect("encode");

        let decoded = Message::decode(&bytes).expect("decode");
        assert_eq!(decoded.completion(), Some(CompletionCode::INVALID_COMMAND));
        assert_eq!(decoded.next_layer(), LayerType::Payload);
        assert_eq!(decoded.payload, vec![0xDE, 0xAD]);
    }

    #[test]
    fn response_needs_completion_code_byte() {
        // Seven bytes with a response function: byte 6 is the trailing checksum.
        let data = [0x81, 0x1C, 0x63, 0x20, 0x00, 0x01, 0xDF];
        let err = Message::decode(&data).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn encode_rejects_mismatched_extension() {
        let mut msg = Message::request(
            Operation::new(NetworkFunction::GROUP_REQ, 0x01),
            0,
            Vec::new(),
        );
        assert!(matches!(
            msg.encode(SerializeOptions::COMPUTE_CHECKSUMS),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn verbatim_checksums_are_kept() {
        let mut msg = Message::request(Operation::GET_DEVICE_ID_REQ, 0, Vec::new());
        msg.checksum1 = 0x11;
        msg.checksum2 = 0x22;
        let bytes = msg.encode(SerializeOptions::default()).expect("encode");
        assert_eq!(bytes[2], 0x11);
        assert_eq!(bytes[6], 0x22);
        assert!(Message::decode(&bytes).is_err());
    }

    #[test]
    fn header_length_per_function() {
        let oem = Operation::oem(false, Enterprise::new(10876).expect("fits"), 0x01);
        let msg = Message::request(oem, 0, Vec::new());
        assert_eq!(msg.header_len(), 10);

        let group = Operation::group(true, BodyCode(0xDC), 0x01);
        let msg = Message::request(group, 0, Vec::new());
        assert_eq!(msg.header_len(), 7);
    }
}
