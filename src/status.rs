//! Status codes and their human readable text.
//!
//! Every failure in this crate carries a 32-bit status code laid out in three
//! independent fields:
//!
//! | Bits | Field | Meaning |
//! |------|-------|---------|
//! | 0..16 | TCP | Socket level failure |
//! | 16..20 | ISO | ISO-on-TCP framing failure |
//! | 20..32 | CLI | Client or controller (CPU) failure |
//!
//! [`error_text`] joins the text of every non-zero field, so a code that
//! combines a socket error with a client error reads as both.
//!
//! # Example
//!
//! ```
//! use s7_client::status::{error_text, category, ErrorCategory, CLI_INVALID_PASSWORD};
//!
//! assert_eq!(error_text(CLI_INVALID_PASSWORD), "CPU : Invalid password");
//! assert_eq!(category(CLI_INVALID_PASSWORD), Some(ErrorCategory::Controller));
//! ```

#![allow(missing_docs)]

/// Mask selecting the TCP field of a status code.
pub const TCP_MASK: u32 = 0x0000_FFFF;
/// Mask selecting the ISO field of a status code.
pub const ISO_MASK: u32 = 0x000F_0000;
/// Mask selecting the client field of a status code.
pub const CLI_MASK: u32 = 0xFFF0_0000;

pub const TCP_SOCKET_CREATION: u32 = 0x0000_0001;
pub const TCP_CONNECTION_TIMEOUT: u32 = 0x0000_0002;
pub const TCP_CONNECTION_FAILED: u32 = 0x0000_0003;
pub const TCP_RECEIVE_TIMEOUT: u32 = 0x0000_0004;
pub const TCP_DATA_RECEIVE: u32 = 0x0000_0005;
pub const TCP_SEND_TIMEOUT: u32 = 0x0000_0006;
pub const TCP_DATA_SEND: u32 = 0x0000_0007;
pub const TCP_CONNECTION_RESET: u32 = 0x0000_0008;
pub const TCP_NOT_CONNECTED: u32 = 0x0000_0009;
pub const TCP_UNREACHABLE_HOST: u32 = 0x0000_2751;

pub const ISO_CONNECT: u32 = 0x0001_0000;
pub const ISO_DISCONNECT: u32 = 0x0002_0000;
pub const ISO_INVALID_PDU: u32 = 0x0003_0000;
pub const ISO_INVALID_DATA_SIZE: u32 = 0x0004_0000;
pub const ISO_SHORT_PACKET: u32 = 0x0006_0000;
pub const ISO_TOO_MANY_FRAGMENTS: u32 = 0x0007_0000;
pub const ISO_PDU_OVERFLOW: u32 = 0x0008_0000;
pub const ISO_SEND_PACKET: u32 = 0x0009_0000;
pub const ISO_RECV_PACKET: u32 = 0x000A_0000;
pub const ISO_INVALID_PARAMS: u32 = 0x000B_0000;

pub const CLI_NEGOTIATING_PDU: u32 = 0x0010_0000;
pub const CLI_INVALID_PARAMS: u32 = 0x0020_0000;
pub const CLI_JOB_PENDING: u32 = 0x0030_0000;
pub const CLI_TOO_MANY_ITEMS: u32 = 0x0040_0000;
pub const CLI_INVALID_WORD_LEN: u32 = 0x0050_0000;
pub const CLI_PARTIAL_DATA_WRITTEN: u32 = 0x0060_0000;
pub const CLI_SIZE_OVER_PDU: u32 = 0x0070_0000;
pub const CLI_INVALID_PLC_ANSWER: u32 = 0x0080_0000;
pub const CLI_ADDRESS_OUT_OF_RANGE: u32 = 0x0090_0000;
pub const CLI_INVALID_TRANSPORT_SIZE: u32 = 0x00A0_0000;
pub const CLI_WRITE_DATA_SIZE_MISMATCH: u32 = 0x00B0_0000;
pub const CLI_ITEM_NOT_AVAILABLE: u32 = 0x00C0_0000;
pub const CLI_INVALID_VALUE: u32 = 0x00D0_0000;
pub const CLI_CANNOT_START_PLC: u32 = 0x00E0_0000;
pub const CLI_ALREADY_RUN: u32 = 0x00F0_0000;
pub const CLI_CANNOT_STOP_PLC: u32 = 0x0100_0000;
pub const CLI_CANNOT_COPY_RAM_TO_ROM: u32 = 0x0110_0000;
pub const CLI_CANNOT_COMPRESS: u32 = 0x0120_0000;
pub const CLI_ALREADY_STOP: u32 = 0x0130_0000;
pub const CLI_FUN_NOT_AVAILABLE: u32 = 0x0140_0000;
pub const CLI_UPLOAD_SEQUENCE_FAILED: u32 = 0x0150_0000;
pub const CLI_INVALID_DATA_SIZE_RECVD: u32 = 0x0160_0000;
pub const CLI_INVALID_BLOCK_TYPE: u32 = 0x0170_0000;
pub const CLI_INVALID_BLOCK_NUMBER: u32 = 0x0180_0000;
pub const CLI_INVALID_BLOCK_SIZE: u32 = 0x0190_0000;
pub const CLI_DOWNLOAD_SEQUENCE_FAILED: u32 = 0x01A0_0000;
pub const CLI_INSERT_REFUSED: u32 = 0x01B0_0000;
pub const CLI_DELETE_REFUSED: u32 = 0x01C0_0000;
pub const CLI_NEED_PASSWORD: u32 = 0x01D0_0000;
pub const CLI_INVALID_PASSWORD: u32 = 0x01E0_0000;
pub const CLI_NO_PASSWORD_TO_SET_OR_CLEAR: u32 = 0x01F0_0000;
pub const CLI_JOB_TIMEOUT: u32 = 0x0200_0000;
pub const CLI_PARTIAL_DATA_READ: u32 = 0x0210_0000;
pub const CLI_BUFFER_TOO_SMALL: u32 = 0x0220_0000;
pub const CLI_FUNCTION_REFUSED: u32 = 0x0230_0000;
pub const CLI_DESTROYING: u32 = 0x0240_0000;
pub const CLI_INVALID_PARAM_NUMBER: u32 = 0x0250_0000;
pub const CLI_CANNOT_CHANGE_PARAM: u32 = 0x0260_0000;
pub const CLI_FUNCTION_NOT_IMPLEMENTED: u32 = 0x0270_0000;

/// Broad origin of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The controller rejected or could not perform the request.
    Controller,
    /// The client detected a problem locally or in the peer's answer.
    Client,
    /// Socket or ISO-on-TCP framing failure.
    Network,
    /// A connection parameter was invalid or could not be changed.
    Parameter,
}

impl ErrorCategory {
    /// Short prefix used in status texts.
    pub fn prefix(self) -> &'static str {
        match self {
            ErrorCategory::Controller => "CPU",
            ErrorCategory::Client | ErrorCategory::Parameter => "CLI",
            ErrorCategory::Network => "ISO",
        }
    }
}

/// Returns the category of the most significant non-zero field of `code`,
/// or `None` for success (zero).
pub fn category(code: u32) -> Option<ErrorCategory> {
    if code & CLI_MASK != 0 {
        Some(cli_category(code & CLI_MASK))
    } else if code & (ISO_MASK | TCP_MASK) != 0 {
        Some(ErrorCategory::Network)
    } else {
        None
    }
}

fn cli_category(code: u32) -> ErrorCategory {
    match code {
        CLI_INVALID_PARAMS | CLI_INVALID_PARAM_NUMBER | CLI_CANNOT_CHANGE_PARAM => {
            ErrorCategory::Parameter
        }
        CLI_NEGOTIATING_PDU
        | CLI_SIZE_OVER_PDU
        | CLI_ADDRESS_OUT_OF_RANGE
        | CLI_INVALID_TRANSPORT_SIZE
        | CLI_WRITE_DATA_SIZE_MISMATCH
        | CLI_ITEM_NOT_AVAILABLE
        | CLI_INVALID_VALUE
        | CLI_CANNOT_START_PLC
        | CLI_ALREADY_RUN
        | CLI_CANNOT_STOP_PLC
        | CLI_CANNOT_COPY_RAM_TO_ROM
        | CLI_CANNOT_COMPRESS
        | CLI_ALREADY_STOP
        | CLI_FUN_NOT_AVAILABLE
        | CLI_UPLOAD_SEQUENCE_FAILED
        | CLI_DOWNLOAD_SEQUENCE_FAILED
        | CLI_INSERT_REFUSED
        | CLI_DELETE_REFUSED
        | CLI_NEED_PASSWORD
        | CLI_INVALID_PASSWORD
        | CLI_NO_PASSWORD_TO_SET_OR_CLEAR => ErrorCategory::Controller,
        _ => ErrorCategory::Client,
    }
}

fn tcp_text(code: u32) -> String {
    match code {
        TCP_SOCKET_CREATION => "TCP : Error creating the Socket".into(),
        TCP_CONNECTION_TIMEOUT => "TCP : Connection timed out".into(),
        TCP_CONNECTION_FAILED => "TCP : Connection refused by the peer".into(),
        TCP_RECEIVE_TIMEOUT => "TCP : Data receive timeout".into(),
        TCP_DATA_RECEIVE => "TCP : Error receiving data".into(),
        TCP_SEND_TIMEOUT => "TCP : Data send timeout".into(),
        TCP_DATA_SEND => "TCP : Error sending data".into(),
        TCP_CONNECTION_RESET => "TCP : Connection reset by the peer".into(),
        TCP_NOT_CONNECTED => "TCP : Not connected".into(),
        TCP_UNREACHABLE_HOST => "TCP : Unreachable host".into(),
        other => format!("TCP : Other Socket error ({other})"),
    }
}

fn iso_text(code: u32) -> &'static str {
    match code {
        ISO_CONNECT => "ISO : Connection error",
        ISO_DISCONNECT => "ISO : Disconnect error",
        ISO_INVALID_PDU => "ISO : Bad format",
        ISO_INVALID_DATA_SIZE => "ISO : Bad Datasize passed to send/recv function",
        ISO_SHORT_PACKET => "ISO : A short packet received",
        ISO_TOO_MANY_FRAGMENTS => "ISO : Too many packets without EoT flag",
        ISO_PDU_OVERFLOW => "ISO : The sum of fragments data exceded maximum packet size",
        ISO_SEND_PACKET => "ISO : An error occurred during send",
        ISO_RECV_PACKET => "ISO : An error occurred during recv",
        ISO_INVALID_PARAMS => "ISO : Invalid connection params (wrong TSAPs)",
        _ => "ISO : Unknown error",
    }
}

fn cli_text(code: u32) -> Option<&'static str> {
    let text = match code {
        CLI_NEGOTIATING_PDU => "CPU : Error in PDU negotiation",
        CLI_INVALID_PARAMS => "CLI : invalid param(s) supplied",
        CLI_JOB_PENDING => "CLI : Job pending",
        CLI_TOO_MANY_ITEMS => "CLI : too may items (>20) in multi read/write",
        CLI_INVALID_WORD_LEN => "CLI : invalid WordLength",
        CLI_PARTIAL_DATA_WRITTEN => "CLI : Partial data written",
        CLI_SIZE_OVER_PDU => "CPU : total data exceeds the PDU size",
        CLI_INVALID_PLC_ANSWER => "CLI : invalid CPU answer",
        CLI_ADDRESS_OUT_OF_RANGE => "CPU : Address out of range",
        CLI_INVALID_TRANSPORT_SIZE => "CPU : Invalid Transport size",
        CLI_WRITE_DATA_SIZE_MISMATCH => "CPU : Data size mismatch",
        CLI_ITEM_NOT_AVAILABLE => "CPU : Item not available",
        CLI_INVALID_VALUE => "CPU : Invalid value supplied",
        CLI_CANNOT_START_PLC => "CPU : Cannot start PLC",
        CLI_ALREADY_RUN => "CPU : PLC already RUN",
        CLI_CANNOT_STOP_PLC => "CPU : Cannot stop PLC",
        CLI_CANNOT_COPY_RAM_TO_ROM => "CPU : Cannot copy RAM to ROM",
        CLI_CANNOT_COMPRESS => "CPU : Cannot compress",
        CLI_ALREADY_STOP => "CPU : PLC already STOP",
        CLI_FUN_NOT_AVAILABLE => "CPU : Function not available",
        CLI_UPLOAD_SEQUENCE_FAILED => "CPU : Upload sequence failed",
        CLI_INVALID_DATA_SIZE_RECVD => "CLI : Invalid data size received",
        CLI_INVALID_BLOCK_TYPE => "CLI : Invalid block type",
        CLI_INVALID_BLOCK_NUMBER => "CLI : Invalid block number",
        CLI_INVALID_BLOCK_SIZE => "CLI : Invalid block size",
        CLI_DOWNLOAD_SEQUENCE_FAILED => "CPU : Download sequence failed",
        CLI_INSERT_REFUSED => "CPU : block insert refused",
        CLI_DELETE_REFUSED => "CPU : block delete refused",
        CLI_NEED_PASSWORD => "CPU : Function not authorized for current protection level",
        CLI_INVALID_PASSWORD => "CPU : Invalid password",
        CLI_NO_PASSWORD_TO_SET_OR_CLEAR => "CPU : No password to set or clear",
        CLI_JOB_TIMEOUT => "CLI : Job Timeout",
        CLI_PARTIAL_DATA_READ => "CLI : Partial data read",
        CLI_BUFFER_TOO_SMALL => {
            "CLI : The buffer supplied is too small to accomplish the operation"
        }
        CLI_FUNCTION_REFUSED => "CLI : function refused by CPU (Unknown error)",
        CLI_DESTROYING => "CLI : Cannot perform (destroying)",
        CLI_INVALID_PARAM_NUMBER => "CLI : Invalid Param Number",
        CLI_CANNOT_CHANGE_PARAM => "CLI : Cannot change this param now",
        CLI_FUNCTION_NOT_IMPLEMENTED => "CLI : Function not implemented",
        _ => return None,
    };
    Some(text)
}

/// Translates a status code into human readable text.
///
/// Zero yields `"OK"`. Codes that do not match any known value produce a
/// generic unknown-error text instead of failing.
pub fn error_text(code: u32) -> String {
    if code == 0 {
        return "OK".to_string();
    }

    let mut parts: Vec<String> = Vec::with_capacity(3);
    let tcp = code & TCP_MASK;
    let iso = code & ISO_MASK;
    let cli = code & CLI_MASK;

    if tcp != 0 {
        parts.push(tcp_text(tcp));
    }
    if iso != 0 {
        parts.push(iso_text(iso).to_string());
    }
    if cli != 0 {
        match cli_text(cli) {
            Some(text) => parts.push(text.to_string()),
            None => parts.push(format!("CLI : Unknown error (0x{code:08X})")),
        }
    }

    parts.join(" - ")
}

/// [`error_text`] for a borrowed code, as used by error `Display` impls.
pub(crate) fn error_text_of(code: &u32) -> String {
    error_text(*code)
}

/// Translates the controller's error word into a client status code.
///
/// The error word is either a single-byte item return code (`0x05`,
/// `0x0A`, ...) or the error class/code pair of a response header
/// (`0x8104`, `0xD602`, ...). It is only translated once the answer has
/// been found to fail, so zero and `0xFF` are malformed answers here, never
/// success.
pub(crate) fn cpu_error(error: u16) -> u32 {
    match error {
        0x0000 | 0x00FF => CLI_INVALID_PLC_ANSWER,
        0x0005 => CLI_ADDRESS_OUT_OF_RANGE,
        0x0006 => CLI_INVALID_TRANSPORT_SIZE,
        0x0007 => CLI_WRITE_DATA_SIZE_MISMATCH,
        0x0003 | 0x000A | 0xD209 | 0xD401 => CLI_ITEM_NOT_AVAILABLE,
        0x8500 => CLI_SIZE_OVER_PDU,
        0xDC01 => CLI_INVALID_VALUE,
        0x8104 => CLI_FUN_NOT_AVAILABLE,
        0xD241 => CLI_NEED_PASSWORD,
        0xD602 => CLI_INVALID_PASSWORD,
        0xD604 | 0xD605 => CLI_NO_PASSWORD_TO_SET_OR_CLEAR,
        _ => CLI_FUNCTION_REFUSED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_client_texts() {
        assert_eq!(error_text(0x01E0_0000), "CPU : Invalid password");
        assert_eq!(error_text(0x00D0_0000), "CPU : Invalid value supplied");
        assert_eq!(error_text(0x0260_0000), "CLI : Cannot change this param now");
        assert_eq!(error_text(CLI_JOB_TIMEOUT), "CLI : Job Timeout");
    }

    #[test]
    fn test_zero_is_ok() {
        assert_eq!(error_text(0), "OK");
        assert_eq!(category(0), None);
    }

    #[test]
    fn test_composite_code_joins_parts() {
        let text = error_text(TCP_CONNECTION_RESET | ISO_RECV_PACKET);
        assert_eq!(
            text,
            "TCP : Connection reset by the peer - ISO : An error occurred during recv"
        );
    }

    #[test]
    fn test_unknown_code_does_not_fail() {
        let text = error_text(0x0FF0_0000);
        assert!(text.contains("Unknown error"));
        assert!(text.contains("0x0FF00000"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(category(CLI_INVALID_PASSWORD), Some(ErrorCategory::Controller));
        assert_eq!(category(CLI_JOB_TIMEOUT), Some(ErrorCategory::Client));
        assert_eq!(category(CLI_CANNOT_CHANGE_PARAM), Some(ErrorCategory::Parameter));
        assert_eq!(category(TCP_NOT_CONNECTED), Some(ErrorCategory::Network));
        assert_eq!(category(ISO_INVALID_PDU), Some(ErrorCategory::Network));
        assert_eq!(ErrorCategory::Controller.prefix(), "CPU");
    }

    #[test]
    fn test_cpu_error_mapping() {
        assert_eq!(cpu_error(0x1234), CLI_FUNCTION_REFUSED);
        assert_eq!(cpu_error(0x05), CLI_ADDRESS_OUT_OF_RANGE);
        assert_eq!(cpu_error(0x0A), CLI_ITEM_NOT_AVAILABLE);
        assert_eq!(cpu_error(0xD602), CLI_INVALID_PASSWORD);
    }

    #[test]
    fn test_failure_never_maps_to_ok() {
        for error in [0x0000, 0x00FF, 0x0001, 0x0100, 0xFFFF] {
            let code = cpu_error(error);
            assert_ne!(code, 0, "{error:#06x}");
            assert_ne!(error_text(code), "OK");
        }
        assert_eq!(cpu_error(0x0000), CLI_INVALID_PLC_ANSWER);
        assert_eq!(cpu_error(0x00FF), CLI_INVALID_PLC_ANSWER);
    }
}
