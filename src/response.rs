//! S7 response parsing and validation.
//!
//! # Response Structure
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Header | 10 or 12 bytes | [`S7Header`]; acknowledgements carry an error class/code |
//! | Parameters | `PLEN` bytes | Function code and function specific fields |
//! | Data | `DLEN` bytes | Item results or user data payload |
//!
//! A non-zero error class/code in an acknowledgement means the controller
//! rejected the whole request. Read and write responses additionally carry
//! one return code per item, where 0xFF means success.
//!
//! # Example
//!
//! ```
//! use s7_client::S7Response;
//!
//! let bytes = [
//!     0x32, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x06, 0x00, 0x00, // header
//!     0x04, 0x01, // read, one item
//!     0xFF, 0x04, 0x00, 0x10, 0x12, 0x34, // success, 16 bits of data
//! ];
//!
//! let response = S7Response::from_bytes(&bytes).unwrap();
//! assert!(response.is_success());
//! assert_eq!(response.function(), Some(0x04));
//! ```

use tracing::trace;

use crate::batch::ItemError;
use crate::error::{Result, S7Error};
use crate::header::{MessageType, S7Header};
use crate::memory::TransportSize;
use crate::status::{cpu_error, CLI_INVALID_PLC_ANSWER, CLI_NEGOTIATING_PDU};

/// Item return code meaning success.
pub const ITEM_OK: u8 = 0xFF;

/// Parsed S7 response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Response {
    /// Response header.
    pub header: S7Header,
    /// Parameter section.
    pub params: Vec<u8>,
    /// Data section.
    pub data: Vec<u8>,
}

impl S7Response {
    /// Parses a response PDU.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error with `CLI_INVALID_PLC_ANSWER` if the header
    /// is invalid or the declared section lengths exceed the buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = S7Header::from_bytes(bytes)?;
        let params_start = header.size();
        let data_start = params_start + usize::from(header.param_len);
        let end = data_start + usize::from(header.data_len);
        if bytes.len() < end {
            trace!(len = bytes.len(), expected = end, "truncated response");
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        Ok(Self {
            header,
            params: bytes[params_start..data_start].to_vec(),
            data: bytes[data_start..end].to_vec(),
        })
    }

    /// Returns true if the header carries no error.
    pub fn is_success(&self) -> bool {
        self.header.error() == 0
    }

    /// Function code (first parameter byte), if any.
    pub fn function(&self) -> Option<u8> {
        self.params.first().copied()
    }

    /// Converts a header error into a `Protocol` error.
    pub fn check(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(S7Error::protocol(cpu_error(self.header.error())))
        }
    }

    /// Checks the header and that the answer is for `function`.
    pub(crate) fn expect_function(&self, function: u8) -> Result<()> {
        self.check()?;
        if self.header.message_type != MessageType::AckData || self.function() != Some(function) {
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        Ok(())
    }
}

/// Extracts the negotiated PDU length from a communication setup answer.
pub(crate) fn parse_setup_communication(response: &S7Response) -> Result<u16> {
    if !response.is_success() || response.params.len() < 8 {
        return Err(S7Error::protocol(CLI_NEGOTIATING_PDU));
    }
    let pdu_length = u16::from_be_bytes([response.params[6], response.params[7]]);
    if pdu_length == 0 {
        return Err(S7Error::protocol(CLI_NEGOTIATING_PDU));
    }
    Ok(pdu_length)
}

fn item_count(response: &S7Response, expected: usize) -> Result<()> {
    match response.params.get(1) {
        Some(&count) if usize::from(count) == expected => Ok(()),
        _ => Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER)),
    }
}

fn item_result(return_code: u8) -> std::result::Result<(), ItemError> {
    if return_code == ITEM_OK {
        Ok(())
    } else {
        Err(ItemError::new(return_code, cpu_error(u16::from(return_code))))
    }
}

/// Splits a read answer into per-item results, in request order.
pub(crate) fn parse_read_items(
    response: &S7Response,
    expected: usize,
) -> Result<Vec<std::result::Result<Vec<u8>, ItemError>>> {
    item_count(response, expected)?;
    let data = &response.data;
    let mut offset = 0;
    let mut results = Vec::with_capacity(expected);
    for index in 0..expected {
        let head = data
            .get(offset..offset + 4)
            .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))?;
        let return_code = head[0];
        let transport = TransportSize::from_code(head[1]).unwrap_or(TransportSize::Octet);
        let len = transport.decode_len(u16::from_be_bytes([head[2], head[3]]));
        offset += 4;

        match item_result(return_code) {
            Ok(()) => {
                let bytes = data
                    .get(offset..offset + len)
                    .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))?;
                results.push(Ok(bytes.to_vec()));
                offset += len;
                if len % 2 == 1 && index + 1 < expected {
                    offset += 1;
                }
            }
            Err(err) => results.push(Err(err)),
        }
    }
    Ok(results)
}

/// Splits a write answer into per-item results, in request order.
pub(crate) fn parse_write_items(
    response: &S7Response,
    expected: usize,
) -> Result<Vec<std::result::Result<(), ItemError>>> {
    item_count(response, expected)?;
    if response.data.len() < expected {
        return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
    }
    Ok(response.data[..expected].iter().map(|&rc| item_result(rc)).collect())
}

/// One fragment of an extended (user data) answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataResponse {
    /// Sequence number to echo when asking for the next fragment.
    pub sequence: u8,
    /// Data unit reference to echo when asking for the next fragment.
    pub data_unit_ref: u8,
    /// True when no further fragment follows.
    pub last_unit: bool,
    /// Function payload of this fragment.
    pub payload: Vec<u8>,
}

impl UserDataResponse {
    /// Parses one user data answer fragment.
    ///
    /// # Errors
    ///
    /// - `Protocol` with the translated CPU code if the parameter error word
    ///   or the data return code reports a failure
    /// - `Protocol` with `CLI_INVALID_PLC_ANSWER` if the layout is wrong
    pub fn parse(response: &S7Response) -> Result<Self> {
        response.check()?;
        let params = &response.params;
        if response.header.message_type != MessageType::UserData || params.len() < 8 {
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        let sequence = params[7];
        let (data_unit_ref, last_unit, error) = if params.len() >= 12 {
            (
                params[8],
                params[9] == 0x00,
                u16::from_be_bytes([params[10], params[11]]),
            )
        } else {
            (0, true, 0)
        };
        if error != 0 {
            return Err(S7Error::protocol(cpu_error(error)));
        }

        let data = &response.data;
        if data.len() < 4 {
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        if data[0] != ITEM_OK {
            return Err(S7Error::protocol(cpu_error(u16::from(data[0]))));
        }
        let len = usize::from(u16::from_be_bytes([data[2], data[3]]));
        let payload = data
            .get(4..4 + len)
            .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))?
            .to_vec();

        Ok(Self {
            sequence,
            data_unit_ref,
            last_unit,
            payload,
        })
    }
}
