//! S7 PDU header.
//!
//! Every S7 PDU starts with a fixed header. Requests (`Job`, `UserData`)
//! use 10 bytes; acknowledgements (`Ack`, `AckData`) append an error class
//! and error code for 12 bytes in total.
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | ID | Protocol id (always 0x32) |
//! | 1 | ROSCTR | Message type |
//! | 2-3 | RED | Redundancy identification (0x0000) |
//! | 4-5 | REF | PDU reference, echoed by the peer |
//! | 6-7 | PLEN | Parameter length |
//! | 8-9 | DLEN | Data length |
//! | 10 | ECLASS | Error class (acknowledgements only) |
//! | 11 | ECODE | Error code (acknowledgements only) |
//!
//! # Example
//!
//! ```
//! use s7_client::{MessageType, S7Header};
//!
//! let header = S7Header::request(MessageType::Job, 0x0100, 14, 0);
//! let bytes = header.to_bytes();
//! assert_eq!(bytes, [0x32, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x0E, 0x00, 0x00]);
//!
//! let parsed = S7Header::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed, header);
//! ```

use crate::error::{Result, S7Error};
use crate::status::CLI_INVALID_PLC_ANSWER;

/// Protocol id carried in byte 0 of every S7 PDU.
pub const S7_PROTOCOL_ID: u8 = 0x32;

/// Header size of `Job` and `UserData` PDUs.
pub const REQUEST_HEADER_SIZE: usize = 10;

/// Header size of `Ack` and `AckData` PDUs.
pub const ACK_HEADER_SIZE: usize = 12;

/// S7 message type (ROSCTR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Request from the client.
    Job,
    /// Acknowledgement without data.
    Ack,
    /// Acknowledgement with data.
    AckData,
    /// Extended (user data) request or response.
    UserData,
}

impl MessageType {
    /// Returns the ROSCTR byte.
    pub fn code(self) -> u8 {
        match self {
            MessageType::Job => 0x01,
            MessageType::Ack => 0x02,
            MessageType::AckData => 0x03,
            MessageType::UserData => 0x07,
        }
    }

    /// Parses a ROSCTR byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(MessageType::Job),
            0x02 => Some(MessageType::Ack),
            0x03 => Some(MessageType::AckData),
            0x07 => Some(MessageType::UserData),
            _ => None,
        }
    }

    /// Size of the header for this message type.
    pub fn header_size(self) -> usize {
        match self {
            MessageType::Ack | MessageType::AckData => ACK_HEADER_SIZE,
            MessageType::Job | MessageType::UserData => REQUEST_HEADER_SIZE,
        }
    }
}

/// Header of an S7 PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S7Header {
    /// Message type.
    pub message_type: MessageType,
    /// PDU reference used to correlate a response with its request.
    pub pdu_ref: u16,
    /// Length of the parameter section.
    pub param_len: u16,
    /// Length of the data section.
    pub data_len: u16,
    /// Error class (acknowledgements only).
    pub error_class: u8,
    /// Error code (acknowledgements only).
    pub error_code: u8,
}

impl S7Header {
    /// Creates a request header with no error fields.
    pub fn request(message_type: MessageType, pdu_ref: u16, param_len: u16, data_len: u16) -> Self {
        Self {
            message_type,
            pdu_ref,
            param_len,
            data_len,
            error_class: 0,
            error_code: 0,
        }
    }

    /// Serialized size of this header.
    pub fn size(&self) -> usize {
        self.message_type.header_size()
    }

    /// Error class and code combined into one word.
    pub fn error(&self) -> u16 {
        u16::from_be_bytes([self.error_class, self.error_code])
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.push(S7_PROTOCOL_ID);
        bytes.push(self.message_type.code());
        bytes.extend_from_slice(&[0x00, 0x00]);
        bytes.extend_from_slice(&self.pdu_ref.to_be_bytes());
        bytes.extend_from_slice(&self.param_len.to_be_bytes());
        bytes.extend_from_slice(&self.data_len.to_be_bytes());
        if self.size() == ACK_HEADER_SIZE {
            bytes.push(self.error_class);
            bytes.push(self.error_code);
        }
        bytes
    }

    /// Parses a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error with `CLI_INVALID_PLC_ANSWER` if the buffer
    /// is too short, the protocol id is wrong or the message type is unknown.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < REQUEST_HEADER_SIZE || data[0] != S7_PROTOCOL_ID {
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        let message_type =
            MessageType::from_code(data[1]).ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))?;

        let mut header = Self::request(
            message_type,
            u16::from_be_bytes([data[4], data[5]]),
            u16::from_be_bytes([data[6], data[7]]),
            u16::from_be_bytes([data[8], data[9]]),
        );
        if header.size() == ACK_HEADER_SIZE {
            if data.len() < ACK_HEADER_SIZE {
                return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
            }
            header.error_class = data[10];
            header.error_code = data[11];
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_codes() {
        for message_type in [
            MessageType::Job,
            MessageType::Ack,
            MessageType::AckData,
            MessageType::UserData,
        ] {
            assert_eq!(MessageType::from_code(message_type.code()), Some(message_type));
        }
        assert_eq!(MessageType::from_code(0x05), None);
    }

    #[test]
    fn test_ack_header_carries_error() {
        let bytes = hex::decode("320300000007000200040581").unwrap();
        let header = S7Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.message_type, MessageType::AckData);
        assert_eq!(header.pdu_ref, 7);
        assert_eq!(header.param_len, 2);
        assert_eq!(header.data_len, 4);
        assert_eq!(header.error(), 0x0581);
        assert_eq!(header.to_bytes(), bytes);
    }

    #[test]
    fn test_userdata_header_size() {
        let header = S7Header::request(MessageType::UserData, 1, 8, 8);
        assert_eq!(header.to_bytes().len(), REQUEST_HEADER_SIZE);
    }

    #[test]
    fn test_invalid_headers() {
        assert!(S7Header::from_bytes(&[0x32, 0x01]).is_err());
        let bad_id = hex::decode("33010000000100000000").unwrap();
        assert_eq!(
            S7Header::from_bytes(&bad_id).unwrap_err(),
            S7Error::protocol(CLI_INVALID_PLC_ANSWER)
        );
        let truncated_ack = hex::decode("32030000000100000000").unwrap();
        assert!(S7Header::from_bytes(&truncated_ack).is_err());
    }
}
