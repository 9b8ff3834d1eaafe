//! One open S7 session: the transport plus the negotiated PDU state.
//!
//! A session is shared between the [`Client`](crate::Client) and its
//! background jobs behind a mutex, so every exchange holds the lock for
//! exactly one request/response round trip (or one fragment sequence).

use tracing::{debug, trace};

use crate::batch::ItemError;
use crate::command::{
    ReadVarCommand, Request, SetupCommunicationCommand, UserDataCommand, WriteVarCommand,
    FN_READ_VAR, FN_WRITE_VAR, READ_OVERHEAD, WRITE_OVERHEAD,
};
use crate::error::{Result, S7Error};
use crate::memory::MemoryAddress;
use crate::response::{
    parse_read_items, parse_setup_communication, parse_write_items, S7Response, UserDataResponse,
};
use crate::status::{CLI_INVALID_PLC_ANSWER, CLI_SIZE_OVER_PDU, CLI_WRITE_DATA_SIZE_MISMATCH};
use crate::transport::Transport;

/// Upper bound on user data fragments accepted for one answer.
const MAX_USER_DATA_FRAGMENTS: usize = 256;

pub(crate) type ItemResults<T> = Vec<std::result::Result<T, ItemError>>;

pub(crate) struct Session<T> {
    pub(crate) transport: T,
    pdu_ref: u16,
    pdu_length: u16,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(transport: T) -> Self {
        Self {
            transport,
            pdu_ref: 0,
            pdu_length: 0,
        }
    }

    /// Negotiated PDU length, 0 before negotiation.
    pub(crate) fn pdu_length(&self) -> u16 {
        self.pdu_length
    }

    pub(crate) fn reset(&mut self) {
        self.pdu_length = 0;
    }

    fn next_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }

    /// Sends raw PDU bytes and returns the raw answer.
    pub(crate) fn exchange_raw(&mut self, pdu: &[u8]) -> Result<Vec<u8>> {
        if !self.transport.is_open() {
            return Err(S7Error::not_connected());
        }
        self.transport.exchange(pdu)
    }

    /// Sends a request and parses the answer, checking the PDU reference.
    pub(crate) fn exchange(&mut self, request: &Request) -> Result<S7Response> {
        let pdu_ref = self.next_ref();
        let answer = self.exchange_raw(&request.to_bytes(pdu_ref))?;
        let response = S7Response::from_bytes(&answer)?;
        if response.header.pdu_ref != pdu_ref {
            trace!(sent = pdu_ref, received = response.header.pdu_ref, "PDU reference mismatch");
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        Ok(response)
    }

    /// Runs the communication setup and stores the PDU length granted by the peer.
    pub(crate) fn negotiate(&mut self, requested: u16) -> Result<u16> {
        let response = self.exchange(&SetupCommunicationCommand::new(requested).to_request())?;
        let granted = parse_setup_communication(&response)?;
        debug!(requested, granted, "PDU length negotiated");
        self.pdu_length = granted;
        Ok(granted)
    }

    /// Largest data payload of a single-item read.
    pub(crate) fn max_read_payload(&self) -> usize {
        usize::from(self.pdu_length).saturating_sub(READ_OVERHEAD)
    }

    /// Largest data payload of a single-item write.
    pub(crate) fn max_write_payload(&self) -> usize {
        usize::from(self.pdu_length).saturating_sub(WRITE_OVERHEAD)
    }

    pub(crate) fn read_vars(&mut self, items: &[MemoryAddress]) -> Result<ItemResults<Vec<u8>>> {
        let command = ReadVarCommand::new(items.to_vec())?;
        let response = self.exchange(&command.to_request())?;
        response.expect_function(FN_READ_VAR)?;
        parse_read_items(&response, items.len())
    }

    pub(crate) fn write_vars(&mut self, items: &[(MemoryAddress, &[u8])]) -> Result<ItemResults<()>> {
        let command = WriteVarCommand::new(items.to_vec())?;
        let response = self.exchange(&command.to_request())?;
        response.expect_function(FN_WRITE_VAR)?;
        parse_write_items(&response, items.len())
    }

    /// Elements per exchange so that each exchange fits in `payload` bytes.
    fn chunk_elements(address: &MemoryAddress, payload: usize) -> Result<u16> {
        let elements = payload / address.word_len().size();
        if elements == 0 {
            return Err(S7Error::protocol(CLI_SIZE_OVER_PDU));
        }
        Ok(elements.min(usize::from(u16::MAX)) as u16)
    }

    /// Reads one area, split into as many exchanges as the PDU requires.
    pub(crate) fn read_area(&mut self, address: &MemoryAddress) -> Result<Vec<u8>> {
        address.validate()?;
        let per_chunk = Self::chunk_elements(address, self.max_read_payload())?;
        let mut buffer = Vec::with_capacity(address.byte_len());
        let mut done: u16 = 0;
        while done < address.amount() {
            let amount = per_chunk.min(address.amount() - done);
            let chunk = address.slice(done, amount)?;
            let mut results = self.read_vars(&[chunk])?;
            let data = results
                .pop()
                .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))?
                .map_err(|e| S7Error::protocol(e.code()))?;
            if data.len() != chunk.byte_len() {
                return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
            }
            buffer.extend_from_slice(&data);
            done += amount;
        }
        Ok(buffer)
    }

    /// Writes one area, split into as many exchanges as the PDU requires.
    pub(crate) fn write_area(&mut self, address: &MemoryAddress, data: &[u8]) -> Result<()> {
        address.validate()?;
        check_write_size(address, data)?;
        let per_chunk = Self::chunk_elements(address, self.max_write_payload())?;
        let size = address.word_len().size();
        let mut done: u16 = 0;
        while done < address.amount() {
            let amount = per_chunk.min(address.amount() - done);
            let chunk = address.slice(done, amount)?;
            let from = usize::from(done) * size;
            let bytes = &data[from..from + chunk.byte_len()];
            let mut results = self.write_vars(&[(chunk, bytes)])?;
            results
                .pop()
                .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))?
                .map_err(|e| S7Error::protocol(e.code()))?;
            done += amount;
        }
        Ok(())
    }

    /// Runs an extended function and concatenates the payload of every fragment.
    pub(crate) fn user_data(&mut self, command: &UserDataCommand) -> Result<Vec<u8>> {
        let mut fragment = UserDataResponse::parse(&self.exchange(&command.to_request())?)?;
        let mut payload = std::mem::take(&mut fragment.payload);
        let mut fragments = 1;
        while !fragment.last_unit {
            if fragments >= MAX_USER_DATA_FRAGMENTS {
                return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
            }
            let next = UserDataCommand::continuation(
                command.group(),
                command.subfunction(),
                fragment.sequence,
                fragment.data_unit_ref,
            );
            fragment = UserDataResponse::parse(&self.exchange(&next.to_request())?)?;
            payload.append(&mut fragment.payload);
            fragments += 1;
        }
        if fragments > 1 {
            debug!(fragments, bytes = payload.len(), "user data reassembled");
        }
        Ok(payload)
    }
}

/// Rejects a write buffer whose length is not `amount × word size`.
pub(crate) fn check_write_size(address: &MemoryAddress, data: &[u8]) -> Result<()> {
    if data.len() != address.byte_len() {
        return Err(S7Error::validation(
            CLI_WRITE_DATA_SIZE_MISMATCH,
            format!(
                "{} bytes given, {} x {:?} needs {}",
                data.len(),
                address.amount(),
                address.word_len(),
                address.byte_len()
            ),
        ));
    }
    Ok(())
}
