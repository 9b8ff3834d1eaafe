//! # S7 Protocol Client
//!
//! A blocking Rust client for Siemens S7 controllers (S7-300/400/1200/1500 and
//! compatibles) speaking the S7 protocol over ISO-on-TCP.
//!
//! ## Features
//!
//! - **Area access**: process inputs/outputs, merkers, data blocks, timers and
//!   counters with word-length aware sizing; large transfers are split into
//!   PDU sized exchanges
//! - **Batches**: up to [`MAX_VARS`] items per exchange with a separate outcome
//!   for every item
//! - **Asynchronous jobs**: start, poll and wait, one job per connection
//! - **Diagnostics**: SZL lists, CPU/order/CP info, protection, block directory
//! - **Control**: stop, hot/cold start, RAM to ROM copy, compress, PLC clock
//! - **No panics**: all errors returned as `Result<T, S7Error>`
//!
//! ## Quick Start
//!
//! ```no_run
//! use s7_client::{Area, Client, ClientConfig, MemoryAddress};
//!
//! fn main() -> s7_client::Result<()> {
//!     // S7-300 CPU in rack 0, slot 2
//!     let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
//!     client.connect()?;
//!     println!("PDU length: {}", client.get_pdu_length());
//!
//!     // Read 16 bytes from DB1.DBB0
//!     let data = client.db_read(1, 0, 16)?;
//!     println!("DB1: {:02X?}", data);
//!
//!     // Write 2 bytes to MB10
//!     client.mb_write(10, &[0x12, 0x34])?;
//!
//!     // Read 4 counters starting at C0
//!     let counters = client.read_area(MemoryAddress::new(Area::Counters, 0, 0, 4))?;
//!     assert_eq!(counters.len(), 8);
//!
//!     client.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Memory Areas
//!
//! | Area | Description | Default word length |
//! |------|-------------|---------------------|
//! | [`Area::ProcessInputs`] | Inputs (PE) | Byte |
//! | [`Area::ProcessOutputs`] | Outputs (PA) | Byte |
//! | [`Area::Merkers`] | Flags (MK) | Byte |
//! | [`Area::DataBlock`] | Data blocks (DB) | Byte |
//! | [`Area::Counters`] | Counters (CT) | Counter, 2 bytes |
//! | [`Area::Timers`] | Timers (TM) | Timer, 2 bytes |
//!
//! ## Error Handling
//!
//! Every failure tells local input mistakes, controller rejections, transport
//! failures and expired waits apart:
//!
//! ```no_run
//! use s7_client::{Client, ClientConfig, S7Error};
//!
//! let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
//! client.connect()?;
//!
//! match client.db_read(999, 0, 4) {
//!     Ok(data) => println!("Data: {:?}", data),
//!     Err(S7Error::Protocol { code }) => println!("rejected: {}", client.error_text(code)),
//!     Err(S7Error::Connection { reason, .. }) => println!("connection lost: {reason}"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), S7Error>(())
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use s7_client::{ClientConfig, ConnectionType, ParamKey, ParamStore};
//!
//! let mut params = ParamStore::default();
//! params.set(ParamKey::RecvTimeout, 5000, false)?;
//! params.set(ParamKey::PDURequest, 960, false)?;
//!
//! let config = ClientConfig::new("192.168.0.1", 0, 1)
//!     .with_port(1102)                              // Custom port (default: 102)
//!     .with_connection_type(ConnectionType::OP)     // OP connection instead of PG
//!     .with_password("secret")                      // Sent after every connect
//!     .with_params(params);
//! # Ok::<(), s7_client::S7Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`](https://docs.rs/tracing): connections at
//! `info`, PDU negotiation, fragment reassembly and jobs at `debug`, raw
//! frames at `trace`. No subscriber is installed by the library.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod batch;
mod client;
mod command;
mod error;
mod header;
mod jobs;
mod memory;
mod params;
mod response;
mod session;
pub mod status;
mod szl;
mod transport;
pub mod utils;

// Public re-exports
pub use batch::{BatchResult, DataItem, ItemError};
pub use client::{Client, ClientConfig, ConnectionState, ConnectionType};
pub use command::{
    ControlCommand, FunctionGroup, ReadVarCommand, Request, SetupCommunicationCommand,
    UserDataCommand, WriteVarCommand, MAX_VARS,
};
pub use error::{Result, S7Error};
pub use header::{MessageType, S7Header, ACK_HEADER_SIZE, REQUEST_HEADER_SIZE, S7_PROTOCOL_ID};
pub use jobs::{AsyncJob, JobRequest, JobState};
pub use memory::{Area, BlockType, MemoryAddress, WordLen, MAX_BIT_ADDRESS};
pub use params::{ParamClass, ParamKey, ParamStore, DEFAULT_PORT, MAX_PDU_REQUEST, MIN_PDU_REQUEST};
pub use response::{S7Response, UserDataResponse, ITEM_OK};
pub use szl::{
    BlockInfo, BlocksList, CpInfo, CpuInfo, CpuState, OrderCode, Protection, SzlHeader, SzlList,
    SZL_COMM_CAPABILITIES, SZL_COMPONENT_ID, SZL_CPU_STATUS, SZL_ID_LIST, SZL_MODULE_ID,
    SZL_PROTECTION,
};
pub use transport::{ConnectTarget, IsoTcpTransport, Transport, ISO_HEADER_SIZE, TPKT_VERSION};
