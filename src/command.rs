//! S7 request structures and serialization.
//!
//! Each command builds a [`Request`], which is the parameter and data
//! sections of one PDU. The header, including the PDU reference, is added
//! when the request is serialized with [`Request::to_bytes`].
//!
//! # Command Types
//!
//! ## Memory Operations
//! - [`ReadVarCommand`] - Read one or more addressed items
//! - [`WriteVarCommand`] - Write one or more addressed items
//!
//! ## Session
//! - [`SetupCommunicationCommand`] - Negotiate the PDU length
//!
//! ## Extended functions
//! - [`UserDataCommand`] - SZL, block directory, clock and password functions
//!
//! ## PLC Control
//! - [`ControlCommand`] - Stop, hot/cold start, RAM to ROM copy, compress
//!
//! # Example
//!
//! ```
//! use s7_client::{MemoryAddress, ReadVarCommand};
//!
//! let cmd = ReadVarCommand::new(vec![MemoryAddress::db(1, 0, 4)]).unwrap();
//! let bytes = cmd.to_request().to_bytes(1);
//! assert_eq!(bytes.len(), 10 + 2 + 12);
//! ```

use crate::error::{Result, S7Error};
use crate::header::{MessageType, S7Header, ACK_HEADER_SIZE, REQUEST_HEADER_SIZE};
use crate::memory::{BlockType, MemoryAddress};
use crate::status::{CLI_INVALID_PARAMS, CLI_TOO_MANY_ITEMS};

/// Maximum number of items in one read or write request.
pub const MAX_VARS: usize = 20;

/// Function code of a read request.
pub(crate) const FN_READ_VAR: u8 = 0x04;
/// Function code of a write request.
pub(crate) const FN_WRITE_VAR: u8 = 0x05;
/// Function code of the communication setup.
pub(crate) const FN_SETUP_COMM: u8 = 0xF0;
/// Function code of a PLC start, copy or compress request.
pub(crate) const FN_PLC_CONTROL: u8 = 0x28;
/// Function code of a PLC stop request.
pub(crate) const FN_PLC_STOP: u8 = 0x29;

/// Size of one item specification in a read or write request.
pub(crate) const ITEM_SPEC_SIZE: usize = 12;
/// Size of the header of one data item (return code, transport size, length).
pub(crate) const DATA_ITEM_HEADER_SIZE: usize = 4;

/// Bytes of a single-item read response that are not item data.
pub(crate) const READ_OVERHEAD: usize = ACK_HEADER_SIZE + 2 + DATA_ITEM_HEADER_SIZE;
/// Bytes of a single-item write request that are not item data.
pub(crate) const WRITE_OVERHEAD: usize =
    REQUEST_HEADER_SIZE + 2 + ITEM_SPEC_SIZE + DATA_ITEM_HEADER_SIZE;

const P_PROGRAM: &[u8] = b"P_PROGRAM";

/// Parameter and data sections of one request PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Message type written in the header.
    pub message_type: MessageType,
    /// Parameter section.
    pub params: Vec<u8>,
    /// Data section.
    pub data: Vec<u8>,
}

impl Request {
    /// Creates a `Job` request without data.
    pub fn job(params: Vec<u8>) -> Self {
        Self {
            message_type: MessageType::Job,
            params,
            data: Vec::new(),
        }
    }

    /// Total serialized length.
    pub fn len(&self) -> usize {
        self.message_type.header_size() + self.params.len() + self.data.len()
    }

    /// Returns true if the request has neither parameters nor data.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.data.is_empty()
    }

    /// Serializes the request with the given PDU reference.
    pub fn to_bytes(&self, pdu_ref: u16) -> Vec<u8> {
        let header = S7Header::request(
            self.message_type,
            pdu_ref,
            self.params.len() as u16,
            self.data.len() as u16,
        );
        let mut bytes = header.to_bytes();
        bytes.reserve(self.params.len() + self.data.len());
        bytes.extend_from_slice(&self.params);
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

/// Communication setup: proposes a PDU length to the peer.
#[derive(Debug, Clone, Copy)]
pub struct SetupCommunicationCommand {
    pdu_length: u16,
}

impl SetupCommunicationCommand {
    /// Creates the setup request for the given PDU length.
    pub fn new(pdu_length: u16) -> Self {
        Self { pdu_length }
    }

    /// Builds the request.
    pub fn to_request(&self) -> Request {
        let mut params = vec![FN_SETUP_COMM, 0x00, 0x00, 0x01, 0x00, 0x01];
        params.extend_from_slice(&self.pdu_length.to_be_bytes());
        Request::job(params)
    }
}

/// Read request for up to [`MAX_VARS`] items.
#[derive(Debug, Clone)]
pub struct ReadVarCommand {
    items: Vec<MemoryAddress>,
    addresses: Vec<u32>,
}

impl ReadVarCommand {
    /// Creates a read request.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if there are no items, more than
    /// [`MAX_VARS`] items, or an item address is invalid.
    pub fn new(items: Vec<MemoryAddress>) -> Result<Self> {
        check_item_count(items.len())?;
        let addresses = wire_addresses(items.iter())?;
        Ok(Self { items, addresses })
    }

    /// Items of the request, in wire order.
    pub fn items(&self) -> &[MemoryAddress] {
        &self.items
    }

    /// Builds the request.
    pub fn to_request(&self) -> Request {
        let mut params = Vec::with_capacity(2 + self.items.len() * ITEM_SPEC_SIZE);
        params.push(FN_READ_VAR);
        params.push(self.items.len() as u8);
        for (item, &address) in self.items.iter().zip(&self.addresses) {
            encode_item_spec(&mut params, item, address);
        }
        Request::job(params)
    }
}

/// Write request for up to [`MAX_VARS`] items.
#[derive(Debug, Clone)]
pub struct WriteVarCommand<'a> {
    items: Vec<(MemoryAddress, &'a [u8])>,
    addresses: Vec<u32>,
}

impl<'a> WriteVarCommand<'a> {
    /// Creates a write request.
    ///
    /// Each buffer must already hold exactly `amount × word size` bytes.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if there are no items, more than
    /// [`MAX_VARS`] items, or an item address is invalid.
    pub fn new(items: Vec<(MemoryAddress, &'a [u8])>) -> Result<Self> {
        check_item_count(items.len())?;
        let addresses = wire_addresses(items.iter().map(|(item, _)| item))?;
        Ok(Self { items, addresses })
    }

    /// Builds the request.
    pub fn to_request(&self) -> Request {
        let mut params = Vec::with_capacity(2 + self.items.len() * ITEM_SPEC_SIZE);
        params.push(FN_WRITE_VAR);
        params.push(self.items.len() as u8);
        let mut data = Vec::new();
        let last = self.items.len() - 1;
        for (index, ((item, bytes), &address)) in self.items.iter().zip(&self.addresses).enumerate() {
            encode_item_spec(&mut params, item, address);
            let transport = item.word_len().transport_size();
            data.push(0x00);
            data.push(transport.code());
            data.extend_from_slice(&transport.encode_len(bytes.len()).to_be_bytes());
            data.extend_from_slice(bytes);
            if bytes.len() % 2 == 1 && index != last {
                data.push(0x00);
            }
        }
        Request {
            message_type: MessageType::Job,
            params,
            data,
        }
    }
}

fn check_item_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(S7Error::validation(CLI_INVALID_PARAMS, "no items given"));
    }
    if count > MAX_VARS {
        return Err(S7Error::validation(
            CLI_TOO_MANY_ITEMS,
            format!("{count} items exceed the limit of {MAX_VARS}"),
        ));
    }
    Ok(())
}

/// Validates every item and returns its wire address.
fn wire_addresses<'i>(items: impl Iterator<Item = &'i MemoryAddress>) -> Result<Vec<u32>> {
    items
        .map(|item| {
            item.validate()?;
            item.wire_address()
        })
        .collect()
}

fn encode_item_spec(out: &mut Vec<u8>, item: &MemoryAddress, address: u32) {
    out.extend_from_slice(&[0x12, 0x0A, 0x10, item.word_len().code()]);
    out.extend_from_slice(&item.amount().to_be_bytes());
    out.extend_from_slice(&item.db_number().to_be_bytes());
    out.push(item.area().code());
    out.extend_from_slice(&[(address >> 16) as u8, (address >> 8) as u8, address as u8]);
}

/// Size of a read request for `count` items.
pub(crate) fn read_request_size(count: usize) -> usize {
    REQUEST_HEADER_SIZE + 2 + count * ITEM_SPEC_SIZE
}

/// Size of the response to a read request with the given item lengths.
pub(crate) fn read_response_size(lengths: impl IntoIterator<Item = usize>) -> usize {
    ACK_HEADER_SIZE + 2 + item_data_size(lengths)
}

/// Size of a write request with the given item lengths.
pub(crate) fn write_request_size(lengths: impl IntoIterator<Item = usize>) -> usize {
    let lengths: Vec<usize> = lengths.into_iter().collect();
    read_request_size(lengths.len()) + item_data_size(lengths)
}

fn item_data_size(lengths: impl IntoIterator<Item = usize>) -> usize {
    lengths
        .into_iter()
        .map(|len| DATA_ITEM_HEADER_SIZE + len + len % 2)
        .sum()
}

/// Function groups of extended (user data) requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionGroup {
    /// Block directory functions.
    Block,
    /// System status list.
    Szl,
    /// Security (password) functions.
    Security,
    /// Clock functions.
    Time,
}

impl FunctionGroup {
    /// Group code in the request form (0x4_).
    pub(crate) fn code(self) -> u8 {
        match self {
            FunctionGroup::Block => 0x43,
            FunctionGroup::Szl => 0x44,
            FunctionGroup::Security => 0x45,
            FunctionGroup::Time => 0x47,
        }
    }
}

pub(crate) const SUB_LIST_BLOCKS: u8 = 0x01;
pub(crate) const SUB_LIST_BLOCKS_OF_TYPE: u8 = 0x02;
pub(crate) const SUB_BLOCK_INFO: u8 = 0x03;
pub(crate) const SUB_READ_SZL: u8 = 0x01;
pub(crate) const SUB_SET_PASSWORD: u8 = 0x01;
pub(crate) const SUB_CLEAR_PASSWORD: u8 = 0x02;
pub(crate) const SUB_GET_TIME: u8 = 0x01;
pub(crate) const SUB_SET_TIME: u8 = 0x02;

/// Extended (user data) request.
///
/// The first request of a function carries an 8 byte parameter block.
/// Follow-up requests that fetch the remaining fragments of a long answer
/// carry a 12 byte block echoing the data unit reference of the previous
/// response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataCommand {
    group: FunctionGroup,
    subfunction: u8,
    sequence: u8,
    data_unit_ref: Option<u8>,
    payload: Option<Vec<u8>>,
}

impl UserDataCommand {
    /// Creates the first request of a function; `payload` is `None` for
    /// functions that take no arguments.
    pub fn new(group: FunctionGroup, subfunction: u8, payload: Option<Vec<u8>>) -> Self {
        Self {
            group,
            subfunction,
            sequence: 0,
            data_unit_ref: None,
            payload,
        }
    }

    /// Creates the request for the next fragment of a long answer.
    pub fn continuation(group: FunctionGroup, subfunction: u8, sequence: u8, data_unit_ref: u8) -> Self {
        Self {
            group,
            subfunction,
            sequence,
            data_unit_ref: Some(data_unit_ref),
            payload: None,
        }
    }

    /// Reads one record list of the system status list.
    pub fn read_szl(id: u16, index: u16) -> Self {
        let mut payload = id.to_be_bytes().to_vec();
        payload.extend_from_slice(&index.to_be_bytes());
        Self::new(FunctionGroup::Szl, SUB_READ_SZL, Some(payload))
    }

    /// Lists the block count of every block type.
    pub fn list_blocks() -> Self {
        Self::new(FunctionGroup::Block, SUB_LIST_BLOCKS, None)
    }

    /// Lists the block numbers of one type.
    pub fn list_blocks_of_type(block_type: BlockType) -> Self {
        Self::new(
            FunctionGroup::Block,
            SUB_LIST_BLOCKS_OF_TYPE,
            Some(vec![0x30, block_type.code()]),
        )
    }

    /// Reads the header information of one block.
    pub fn block_info(block_type: BlockType, number: u16) -> Self {
        let mut payload = vec![0x30, block_type.code()];
        payload.extend_from_slice(format!("{number:05}").as_bytes());
        payload.push(b'A');
        Self::new(FunctionGroup::Block, SUB_BLOCK_INFO, Some(payload))
    }

    /// Reads the controller clock.
    pub fn get_time() -> Self {
        Self::new(FunctionGroup::Time, SUB_GET_TIME, None)
    }

    /// Sets the controller clock from a 10 byte BCD timestamp.
    pub fn set_time(timestamp: [u8; 10]) -> Self {
        Self::new(FunctionGroup::Time, SUB_SET_TIME, Some(timestamp.to_vec()))
    }

    /// Sends the session password.
    pub fn set_password(password: &str) -> Self {
        Self::new(
            FunctionGroup::Security,
            SUB_SET_PASSWORD,
            Some(encode_password(password).to_vec()),
        )
    }

    /// Clears the session password.
    pub fn clear_password() -> Self {
        Self::new(FunctionGroup::Security, SUB_CLEAR_PASSWORD, None)
    }

    /// Function group.
    pub fn group(&self) -> FunctionGroup {
        self.group
    }

    /// Subfunction code.
    pub fn subfunction(&self) -> u8 {
        self.subfunction
    }

    /// Builds the request.
    pub fn to_request(&self) -> Request {
        let params = match self.data_unit_ref {
            None => vec![
                0x00,
                0x01,
                0x12,
                0x04,
                0x11,
                self.group.code(),
                self.subfunction,
                self.sequence,
            ],
            Some(unit) => vec![
                0x00,
                0x01,
                0x12,
                0x08,
                0x12,
                self.group.code(),
                self.subfunction,
                self.sequence,
                unit,
                0x00,
                0x00,
                0x00,
            ],
        };
        let data = match &self.payload {
            Some(payload) => {
                let mut data = vec![0xFF, 0x09];
                data.extend_from_slice(&(payload.len() as u16).to_be_bytes());
                data.extend_from_slice(payload);
                data
            }
            None => vec![0x0A, 0x00, 0x00, 0x00],
        };
        Request {
            message_type: MessageType::UserData,
            params,
            data,
        }
    }
}

/// Encodes a session password into its 8 byte wire form.
///
/// The password is space padded to 8 bytes; the first two bytes are XORed
/// with 0x55 and every following byte with 0x55 and the encoded byte two
/// positions earlier.
pub(crate) fn encode_password(password: &str) -> [u8; 8] {
    let mut plain = [b' '; 8];
    for (slot, byte) in plain.iter_mut().zip(password.bytes()) {
        *slot = byte;
    }
    let mut encoded = [0u8; 8];
    encoded[0] = plain[0] ^ 0x55;
    encoded[1] = plain[1] ^ 0x55;
    for i in 2..8 {
        encoded[i] = plain[i] ^ 0x55 ^ encoded[i - 2];
    }
    encoded
}

/// PLC control requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Put the CPU into STOP.
    Stop,
    /// Restart the CPU keeping retentive data.
    HotStart,
    /// Restart the CPU resetting all data.
    ColdStart,
    /// Copy the RAM program into ROM.
    CopyRamToRom,
    /// Compress the user memory.
    Compress,
}

impl ControlCommand {
    /// Function code echoed by the peer on success.
    pub(crate) fn function(self) -> u8 {
        match self {
            ControlCommand::Stop => FN_PLC_STOP,
            _ => FN_PLC_CONTROL,
        }
    }

    /// Builds the request.
    pub fn to_request(&self) -> Request {
        let mut params = Vec::with_capacity(22);
        match self {
            ControlCommand::Stop => {
                params.extend_from_slice(&[FN_PLC_STOP, 0x00, 0x00, 0x00, 0x00, 0x00]);
                push_name(&mut params, P_PROGRAM);
            }
            ControlCommand::HotStart => {
                params.extend_from_slice(&control_prefix());
                params.extend_from_slice(&[0x00, 0x00]);
                push_name(&mut params, P_PROGRAM);
            }
            ControlCommand::ColdStart => {
                params.extend_from_slice(&control_prefix());
                params.extend_from_slice(&[0x00, 0x02, b'C', b' ']);
                push_name(&mut params, P_PROGRAM);
            }
            ControlCommand::CopyRamToRom => {
                params.extend_from_slice(&control_prefix());
                params.extend_from_slice(&[0x00, 0x02, b'E', b'P']);
                push_name(&mut params, b"_MODU");
            }
            ControlCommand::Compress => {
                params.extend_from_slice(&control_prefix());
                params.extend_from_slice(&[0x00, 0x00]);
                push_name(&mut params, b"_GARB");
            }
        }
        Request::job(params)
    }
}

fn control_prefix() -> [u8; 8] {
    [FN_PLC_CONTROL, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFD]
}

fn push_name(params: &mut Vec<u8>, name: &[u8]) {
    params.push(name.len() as u8);
    params.extend_from_slice(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Area, TransportSize, WordLen};
    use crate::response::{parse_read_items, S7Response};

    #[test]
    fn test_setup_communication() {
        let bytes = SetupCommunicationCommand::new(480).to_request().to_bytes(0x0400);
        assert_eq!(hex::encode(bytes), "32010000040000080000f0000001000101e0");
    }

    #[test]
    fn test_read_var_encoding() {
        let cmd = ReadVarCommand::new(vec![MemoryAddress::db(1, 2, 4)]).unwrap();
        let bytes = cmd.to_request().to_bytes(1);
        assert_eq!(
            hex::encode(bytes),
            "320100000001000e00000401120a10020004000184000010"
        );
    }

    #[test]
    fn test_read_var_counter_address_not_scaled() {
        let cmd = ReadVarCommand::new(vec![MemoryAddress::new(Area::Counters, 0, 5, 2)]).unwrap();
        let params = cmd.to_request().params;
        assert_eq!(&params[2..], hex::decode("120a101c000200001c000005").unwrap());
    }

    #[test]
    fn test_read_var_item_limits() {
        assert!(ReadVarCommand::new(Vec::new()).is_err());
        let items = vec![MemoryAddress::db(1, 0, 1); MAX_VARS + 1];
        let err = ReadVarCommand::new(items).unwrap_err();
        assert_eq!(err.code(), CLI_TOO_MANY_ITEMS);
    }

    #[test]
    fn test_write_var_pads_odd_items() {
        let first = [0xAA];
        let second = [0x01, 0x02, 0x03];
        let cmd = WriteVarCommand::new(vec![
            (MemoryAddress::db(1, 0, 1), &first[..]),
            (MemoryAddress::new(Area::Merkers, 0, 10, 3), &second[..]),
        ])
        .unwrap();
        let request = cmd.to_request();
        assert_eq!(request.params.len(), 2 + 2 * ITEM_SPEC_SIZE);
        assert_eq!(
            hex::encode(&request.data),
            "00040008aa0000040018010203"
        );
        assert!(request.len() <= write_request_size([first.len(), second.len()]));
    }

    #[test]
    fn test_write_var_transport_sizes() {
        let real = [0u8; 4];
        let timer = [0u8; 2];
        let cmd = WriteVarCommand::new(vec![
            (MemoryAddress::db(1, 0, 1).with_word_len(WordLen::Real).unwrap(), &real[..]),
            (MemoryAddress::new(Area::Timers, 0, 0, 1), &timer[..]),
        ])
        .unwrap();
        let data = cmd.to_request().data;
        assert_eq!(&data[..4], &[0x00, 0x07, 0x00, 0x04]);
        assert_eq!(&data[8..12], &[0x00, 0x09, 0x00, 0x02]);
    }

    #[test]
    fn test_read_szl_request() {
        let bytes = UserDataCommand::read_szl(0x001C, 0).to_request().to_bytes(5);
        assert_eq!(
            hex::encode(bytes),
            "320700000005000800080001120411440100ff090004001c0000"
        );
    }

    #[test]
    fn test_continuation_request() {
        let request = UserDataCommand::continuation(FunctionGroup::Szl, SUB_READ_SZL, 3, 0x12).to_request();
        assert_eq!(hex::encode(&request.params), "000112081244010312000000");
        assert_eq!(request.data, vec![0x0A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_block_info_request() {
        let request = UserDataCommand::block_info(BlockType::DB, 42).to_request();
        assert_eq!(&request.data[..4], &[0xFF, 0x09, 0x00, 0x08]);
        assert_eq!(&request.data[4..], b"\x30\x4100042A");
    }

    #[test]
    fn test_password_encoding() {
        let encoded = encode_password("ab");
        assert_eq!(encoded[0], b'a' ^ 0x55);
        assert_eq!(encoded[1], b'b' ^ 0x55);
        assert_eq!(encoded[2], b' ' ^ 0x55 ^ encoded[0]);
        assert_eq!(encoded[7], b' ' ^ 0x55 ^ encoded[5]);
    }

    #[test]
    fn test_control_requests() {
        assert_eq!(
            hex::encode(ControlCommand::Stop.to_request().params),
            "29000000000009505f50524f4752414d"
        );
        let cold = ControlCommand::ColdStart.to_request().params;
        assert_eq!(cold.len(), 22);
        assert_eq!(&cold[8..12], &[0x00, 0x02, b'C', b' ']);
        let compress = ControlCommand::Compress.to_request().params;
        assert_eq!(&compress[10..], b"\x05_GARB");
        assert_eq!(ControlCommand::HotStart.function(), FN_PLC_CONTROL);
    }

    #[test]
    fn test_every_word_len_round_trips() {
        let all = [
            WordLen::Bit,
            WordLen::Byte,
            WordLen::Char,
            WordLen::Word,
            WordLen::Int,
            WordLen::DWord,
            WordLen::DInt,
            WordLen::Real,
            WordLen::Counter,
            WordLen::Timer,
        ];
        for word_len in all {
            let area = match word_len {
                WordLen::Counter => Area::Counters,
                WordLen::Timer => Area::Timers,
                _ => Area::DataBlock,
            };
            let address = MemoryAddress::new(area, 3, 12, 3).with_word_len(word_len).unwrap();
            let payload: Vec<u8> = (1..=address.byte_len() as u8).collect();

            let params = ReadVarCommand::new(vec![address]).unwrap().to_request().params;
            let spec = &params[2..];
            assert_eq!(WordLen::from_code(spec[3]), Some(word_len));
            assert_eq!(u16::from_be_bytes([spec[4], spec[5]]), address.amount());
            assert_eq!(Area::from_code(spec[8]), Some(area));
            let wire = u32::from_be_bytes([0, spec[9], spec[10], spec[11]]);
            assert_eq!(wire, address.wire_address().unwrap(), "{word_len:?}");

            // the length field of a data item decodes back to the byte count
            let data = WriteVarCommand::new(vec![(address, payload.as_slice())])
                .unwrap()
                .to_request()
                .data;
            let transport = TransportSize::from_code(data[1]).unwrap();
            assert_eq!(transport, word_len.transport_size());
            assert_eq!(
                transport.decode_len(u16::from_be_bytes([data[2], data[3]])),
                payload.len(),
                "{word_len:?}"
            );

            let mut answer = S7Header::request(MessageType::AckData, 1, 2, data.len() as u16).to_bytes();
            answer.extend_from_slice(&[FN_READ_VAR, 0x01]);
            answer.push(0xFF);
            answer.extend_from_slice(&data[1..]);
            let response = S7Response::from_bytes(&answer).unwrap();
            let items = parse_read_items(&response, 1).unwrap();
            assert_eq!(items[0].as_ref().unwrap(), &payload, "{word_len:?}");
        }
    }

    #[test]
    fn test_size_helpers() {
        assert_eq!(read_request_size(1), 24);
        assert_eq!(read_response_size([3]), 12 + 2 + 4 + 4);
        assert_eq!(READ_OVERHEAD, 18);
        assert_eq!(WRITE_OVERHEAD, 28);
    }
}
