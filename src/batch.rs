//! Multi-item read and write transactions.
//!
//! A batch packs up to [`MAX_VARS`](crate::MAX_VARS) items into one
//! exchange. The call itself either fails as a whole (transport or framing
//! failure, nothing valid) or returns a [`BatchResult`] in which every item
//! carries its own outcome, in the order the items were submitted.
//!
//! # Example
//!
//! ```no_run
//! use s7_client::{Area, Client, ClientConfig, DataItem, MemoryAddress};
//!
//! let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
//! client.connect()?;
//!
//! let written = client.write_multi_vars(&[
//!     DataItem::new(MemoryAddress::db(1, 0, 4), vec![1, 2, 3, 4]),
//!     DataItem::new(MemoryAddress::new(Area::Merkers, 0, 10, 2), vec![5, 6]),
//! ])?;
//! assert!(written.all_ok());
//!
//! let read = client.read_multi_vars(&[MemoryAddress::db(1, 0, 4)])?;
//! for (index, item) in read.iter().enumerate() {
//!     match item {
//!         Ok(bytes) => println!("item {index}: {bytes:02X?}"),
//!         Err(err) => println!("item {index} failed: {err}"),
//!     }
//! }
//! # Ok::<(), s7_client::S7Error>(())
//! ```

use thiserror::Error;
use tracing::debug;

use crate::client::Client;
use crate::command::{read_request_size, read_response_size, write_request_size, MAX_VARS};
use crate::error::{Result, S7Error};
use crate::memory::MemoryAddress;
use crate::session::check_write_size;
use crate::status::{self, CLI_INVALID_PARAMS, CLI_SIZE_OVER_PDU, CLI_TOO_MANY_ITEMS};
use crate::transport::Transport;

/// Failure of one item inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", status::error_text_of(.code))]
pub struct ItemError {
    return_code: u8,
    code: u32,
}

impl ItemError {
    pub(crate) fn new(return_code: u8, code: u32) -> Self {
        Self { return_code, code }
    }

    /// Error for an item rejected before the exchange.
    pub(crate) fn local(code: u32) -> Self {
        Self::new(0x00, code)
    }

    /// Client status code of the failure.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Raw return code sent by the controller (0 for items rejected locally).
    pub fn return_code(&self) -> u8 {
        self.return_code
    }
}

/// One item of a write batch: an address and the bytes to store there.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataItem {
    /// Target address.
    pub address: MemoryAddress,
    /// Data to write; must be `amount × word size` bytes long.
    pub data: Vec<u8>,
}

impl DataItem {
    /// Creates a write item.
    pub fn new(address: MemoryAddress, data: Vec<u8>) -> Self {
        Self { address, data }
    }
}

/// Per-item outcomes of a batch that reached the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult<T> {
    results: Vec<std::result::Result<T, ItemError>>,
}

impl<T> BatchResult<T> {
    pub(crate) fn new(results: Vec<std::result::Result<T, ItemError>>) -> Self {
        Self { results }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Outcome of the item at `index`.
    pub fn get(&self, index: usize) -> Option<&std::result::Result<T, ItemError>> {
        self.results.get(index)
    }

    /// Iterates over the outcomes in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, std::result::Result<T, ItemError>> {
        self.results.iter()
    }

    /// Returns true if every item succeeded.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.is_ok())
    }

    /// Consumes the batch and returns the outcomes.
    pub fn into_results(self) -> Vec<std::result::Result<T, ItemError>> {
        self.results
    }
}

impl<T> IntoIterator for BatchResult<T> {
    type Item = std::result::Result<T, ItemError>;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

fn check_batch_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(S7Error::validation(CLI_INVALID_PARAMS, "empty batch"));
    }
    if len > MAX_VARS {
        return Err(S7Error::validation(
            CLI_TOO_MANY_ITEMS,
            format!("{len} items exceed the limit of {MAX_VARS}"),
        ));
    }
    Ok(())
}

fn check_fits(size: usize, pdu_length: u16) -> Result<()> {
    if size > usize::from(pdu_length) {
        return Err(S7Error::validation(
            CLI_SIZE_OVER_PDU,
            format!("batch needs {size} bytes, PDU is {pdu_length}"),
        ));
    }
    Ok(())
}

/// Merges wire results back into the slots of the accepted items.
fn merge<T>(
    mut slots: Vec<Option<std::result::Result<T, ItemError>>>,
    wire: Vec<std::result::Result<T, ItemError>>,
) -> BatchResult<T> {
    let mut wire = wire.into_iter();
    let results = slots
        .iter_mut()
        .map(|slot| match slot.take() {
            Some(local) => local,
            None => wire
                .next()
                .unwrap_or(Err(ItemError::local(status::CLI_INVALID_PLC_ANSWER))),
        })
        .collect();
    BatchResult::new(results)
}

impl<T: Transport> Client<T> {
    /// Reads several items in one exchange.
    ///
    /// Items whose address is invalid are rejected locally and reported in
    /// their slot; the rest go to the controller.
    ///
    /// # Errors
    ///
    /// - `Validation` if the batch is empty, has more than [`MAX_VARS`]
    ///   items, or does not fit in the negotiated PDU
    /// - `Connection`/`Protocol` if the exchange itself fails
    pub fn read_multi_vars(&mut self, items: &[MemoryAddress]) -> Result<BatchResult<Vec<u8>>> {
        self.record(check_batch_len(items.len()))?;

        let mut slots = Vec::with_capacity(items.len());
        let mut accepted = Vec::with_capacity(items.len());
        for item in items {
            match item.validate() {
                Ok(()) => {
                    slots.push(None);
                    accepted.push(*item);
                }
                Err(err) => slots.push(Some(Err(ItemError::local(err.code())))),
            }
        }
        debug!(items = items.len(), accepted = accepted.len(), "read batch");

        self.with_session(|session| {
            if accepted.is_empty() {
                return Ok(merge(slots, Vec::new()));
            }
            let pdu = session.pdu_length();
            check_fits(read_request_size(accepted.len()), pdu)?;
            check_fits(read_response_size(accepted.iter().map(|a| a.byte_len())), pdu)?;
            let wire = session.read_vars(&accepted)?;
            Ok(merge(slots, wire))
        })
    }

    /// Writes several items in one exchange.
    ///
    /// Items whose buffer length is not `amount × word size`, or whose
    /// address is invalid, are rejected locally and never sent.
    ///
    /// # Errors
    ///
    /// - `Validation` if the batch is empty, has more than [`MAX_VARS`]
    ///   items, or does not fit in the negotiated PDU
    /// - `Connection`/`Protocol` if the exchange itself fails
    pub fn write_multi_vars(&mut self, items: &[DataItem]) -> Result<BatchResult<()>> {
        self.record(check_batch_len(items.len()))?;

        let mut slots = Vec::with_capacity(items.len());
        let mut accepted: Vec<(MemoryAddress, &[u8])> = Vec::with_capacity(items.len());
        for item in items {
            let check = item
                .address
                .validate()
                .and_then(|()| check_write_size(&item.address, &item.data));
            match check {
                Ok(()) => {
                    slots.push(None);
                    accepted.push((item.address, item.data.as_slice()));
                }
                Err(err) => slots.push(Some(Err(ItemError::local(err.code())))),
            }
        }
        debug!(items = items.len(), accepted = accepted.len(), "write batch");

        self.with_session(|session| {
            if accepted.is_empty() {
                return Ok(merge(slots, Vec::new()));
            }
            check_fits(
                write_request_size(accepted.iter().map(|(_, data)| data.len())),
                session.pdu_length(),
            )?;
            let wire = session.write_vars(&accepted)?;
            Ok(merge(slots, wire))
        })
    }
}
