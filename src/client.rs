//! High-level S7 client.
//!
//! This module provides the [`Client`] struct, the primary interface for
//! talking to an S7 controller.
//!
//! # Overview
//!
//! The client handles:
//! - Session setup: TSAP computation, ISO connection, PDU negotiation and
//!   the optional session password
//! - Area reads and writes, split into PDU sized exchanges
//! - PLC control (stop, hot/cold start, RAM to ROM copy, compress) and clock
//! - Parameter management through [`ParamStore`]
//!
//! Batched transfers, asynchronous jobs and SZL diagnostics are methods of
//! the same `Client`, implemented next to their wire types.
//!
//! # Example
//!
//! ```no_run
//! use s7_client::{Area, Client, ClientConfig, MemoryAddress, WordLen};
//!
//! let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
//! client.connect()?;
//!
//! // Read 10 bytes from DB1.DBB0
//! let data = client.db_read(1, 0, 10)?;
//!
//! // Write two reals to MD100
//! let address = MemoryAddress::new(Area::Merkers, 0, 100, 2).with_word_len(WordLen::Real)?;
//! client.write_area(address, &[0x42, 0xC8, 0x00, 0x00, 0x3F, 0x80, 0x00, 0x00])?;
//!
//! client.disconnect();
//! # Ok::<(), s7_client::S7Error>(())
//! ```
//!
//! # Thread Safety
//!
//! Every call blocks the calling thread for the network round trip. One
//! `Client` owns one connection; methods take `&mut self`, so callers that
//! share a client between threads wrap it in a mutex of their own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, Local, NaiveDateTime};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::command::{ControlCommand, UserDataCommand};
use crate::error::{Result, S7Error};
use crate::jobs::AsyncJob;
use crate::memory::{Area, BlockType, MemoryAddress};
use crate::params::{ParamKey, ParamStore};
use crate::response::S7Response;
use crate::session::{check_write_size, Session};
use crate::status::{
    self, CLI_ALREADY_RUN, CLI_ALREADY_STOP, CLI_CANNOT_COMPRESS, CLI_CANNOT_COPY_RAM_TO_ROM,
    CLI_CANNOT_START_PLC, CLI_CANNOT_STOP_PLC, CLI_INVALID_PARAMS, CLI_INVALID_PLC_ANSWER,
    CLI_JOB_PENDING, CLI_SIZE_OVER_PDU,
};
use crate::transport::{ConnectTarget, IsoTcpTransport, Transport};
use crate::utils::{byte_to_bcd, get_dt, set_dt};

/// Connection type, sent in the high byte of the remote TSAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionType {
    /// Programming device connection.
    #[default]
    PG,
    /// Operator panel connection.
    OP,
    /// Basic S7 connection.
    S7Basic,
}

impl ConnectionType {
    /// Returns the wire code of the connection type.
    pub fn code(self) -> u16 {
        match self {
            ConnectionType::PG => 0x01,
            ConnectionType::OP => 0x02,
            ConnectionType::S7Basic => 0x03,
        }
    }
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session.
    Disconnected,
    /// Session setup in progress.
    Connecting,
    /// Session open and negotiated.
    Connected,
}

/// Configuration for creating an S7 client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// Controller host name or IP address.
    pub host: String,
    /// Rack of the CPU.
    pub rack: u16,
    /// Slot of the CPU.
    pub slot: u16,
    /// Connection type.
    pub connection_type: ConnectionType,
    /// Explicit local TSAP; `SrcTSap` is used when `None`.
    pub local_tsap: Option<u16>,
    /// Explicit remote TSAP; computed from type, rack and slot when `None`.
    pub remote_tsap: Option<u16>,
    /// Session password sent right after the PDU negotiation.
    pub password: Option<String>,
    /// Initial parameter values.
    pub params: ParamStore,
}

impl ClientConfig {
    /// Creates a configuration with default parameters.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::ClientConfig;
    ///
    /// let config = ClientConfig::new("192.168.0.1", 0, 2);
    /// assert_eq!(config.remote_tsap(), 0x0102);
    /// ```
    pub fn new(host: impl Into<String>, rack: u16, slot: u16) -> Self {
        Self {
            host: host.into(),
            rack,
            slot,
            connection_type: ConnectionType::default(),
            local_tsap: None,
            remote_tsap: None,
            password: None,
            params: ParamStore::default(),
        }
    }

    /// Sets a custom port (default is 102).
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::{ClientConfig, ParamKey};
    ///
    /// let config = ClientConfig::new("192.168.0.1", 0, 2).with_port(1102);
    /// assert_eq!(config.params.get(ParamKey::RemotePort).unwrap(), 1102);
    /// ```
    pub fn with_port(mut self, port: u16) -> Self {
        self.params.force_remote_port(port);
        self
    }

    /// Sets the response timeout (default is 3000 ms).
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use s7_client::{ClientConfig, ParamKey};
    ///
    /// let config = ClientConfig::new("192.168.0.1", 0, 2).with_timeout(Duration::from_secs(5));
    /// assert_eq!(config.params.get(ParamKey::RecvTimeout).unwrap(), 5000);
    /// ```
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.params.force_recv_timeout(timeout);
        self
    }

    /// Sets the connection type.
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    /// Uses explicit TSAPs instead of the rack/slot convention.
    pub fn with_tsap(mut self, local_tsap: u16, remote_tsap: u16) -> Self {
        self.local_tsap = Some(local_tsap);
        self.remote_tsap = Some(remote_tsap);
        self
    }

    /// Sends `password` as session password on every connect.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Replaces the initial parameter values.
    pub fn with_params(mut self, params: ParamStore) -> Self {
        self.params = params;
        self
    }

    /// Local TSAP used when connecting.
    pub fn local_tsap(&self) -> u16 {
        self.local_tsap.unwrap_or(self.params.src_tsap())
    }

    /// Remote TSAP used when connecting: `type << 8 | rack * 0x20 + slot`.
    pub fn remote_tsap(&self) -> u16 {
        self.remote_tsap.unwrap_or_else(|| {
            (self.connection_type.code() << 8)
                | (self.rack.wrapping_mul(0x20).wrapping_add(self.slot) & 0xFF)
        })
    }
}

/// S7 client bound to one connection.
///
/// The transport defaults to [`IsoTcpTransport`]; any [`Transport`] can be
/// plugged in with [`Client::with_transport`].
///
/// Dropping the client disconnects it.
pub struct Client<T: Transport = IsoTcpTransport> {
    config: ClientConfig,
    pub(crate) session: Arc<Mutex<Session<T>>>,
    state: ConnectionState,
    pub(crate) job: Option<AsyncJob>,
    last_error: u32,
    exec_time: Duration,
    password_set: bool,
}

impl Client<IsoTcpTransport> {
    /// Creates a disconnected client using ISO-on-TCP.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::{Client, ClientConfig};
    ///
    /// let client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
    /// assert!(!client.get_connected());
    /// ```
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, IsoTcpTransport::new())
    }
}

impl<T: Transport> Client<T> {
    /// Creates a disconnected client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(Session::new(transport))),
            state: ConnectionState::Disconnected,
            job: None,
            last_error: 0,
            exec_time: Duration::ZERO,
            password_set: false,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Connection management
    // ---------------------------------------------------------------------

    /// Connects using the configured host, rack, slot and port.
    ///
    /// An open connection is closed first. On success the PDU length is
    /// negotiated again and the session password state is reset (then set
    /// again if the configuration carries a password).
    ///
    /// # Errors
    ///
    /// - `Connection` if the controller cannot be reached or refuses the session
    /// - `Protocol` if the PDU negotiation fails
    /// - `Auth` if the configured password is rejected
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();
        self.state = ConnectionState::Connecting;
        let started = Instant::now();
        let result = self.open_session();
        self.exec_time = started.elapsed();

        match result {
            Ok(pdu_length) => {
                self.state = ConnectionState::Connected;
                self.last_error = 0;
                info!(
                    host = %self.config.host,
                    rack = self.config.rack,
                    slot = self.config.slot,
                    pdu_length,
                    "connected"
                );
                Ok(())
            }
            Err(err) => {
                warn!(host = %self.config.host, error = %err, "connect failed");
                self.session.lock().transport.close();
                self.state = ConnectionState::Disconnected;
                self.last_error = err.code();
                Err(err)
            }
        }
    }

    /// Connects to `host` at `rack`/`slot` on `port`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use s7_client::{Client, ClientConfig};
    ///
    /// let mut client = Client::new(ClientConfig::new("0.0.0.0", 0, 0));
    /// client.connect_to("192.168.0.1", 0, 2, 102)?;
    /// # Ok::<(), s7_client::S7Error>(())
    /// ```
    pub fn connect_to(&mut self, host: &str, rack: u16, slot: u16, port: u16) -> Result<()> {
        self.disconnect();
        self.config.host = host.to_string();
        self.config.rack = rack;
        self.config.slot = slot;
        self.config.params.force_remote_port(port);
        self.connect()
    }

    fn open_session(&mut self) -> Result<u16> {
        let target = ConnectTarget::from_params(
            &self.config.host,
            self.config.local_tsap(),
            self.config.remote_tsap(),
            &self.config.params,
        );
        let mut session = self.session.lock();
        session.reset();
        self.password_set = false;
        session.transport.open(&target)?;
        let pdu_length = session.negotiate(self.config.params.pdu_request())?;
        if let Some(password) = &self.config.password {
            session
                .user_data(&UserDataCommand::set_password(password))
                .map_err(as_auth_error)?;
            self.password_set = true;
        }
        Ok(pdu_length)
    }

    /// Closes the connection. Safe to call in any state and more than once.
    pub fn disconnect(&mut self) {
        let was_connected = self.state != ConnectionState::Disconnected;
        self.job = None;
        self.session.lock().transport.close();
        self.state = ConnectionState::Disconnected;
        self.password_set = false;
        if was_connected {
            info!(host = %self.config.host, "disconnected");
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true while connected.
    pub fn get_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// PDU length granted by the controller (0 while disconnected).
    pub fn get_pdu_length(&self) -> u16 {
        if self.get_connected() {
            self.session.lock().pdu_length()
        } else {
            0
        }
    }

    /// Duration of the last completed operation.
    pub fn get_exec_time(&self) -> Duration {
        self.exec_time
    }

    /// Status code of the last operation (0 on success).
    pub fn get_last_error(&self) -> u32 {
        self.last_error
    }

    /// Translates a status code into text.
    pub fn error_text(&self, code: u32) -> String {
        status::error_text(code)
    }

    /// Changes address and TSAPs used by the next connect.
    pub fn set_connection_params(&mut self, address: &str, local_tsap: u16, remote_tsap: u16) {
        self.config.host = address.to_string();
        self.config.local_tsap = Some(local_tsap);
        self.config.remote_tsap = Some(remote_tsap);
    }

    /// Changes the connection type used by the next connect.
    pub fn set_connection_type(&mut self, connection_type: ConnectionType) {
        self.config.connection_type = connection_type;
    }

    /// Reads a parameter.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for server-only keys.
    pub fn get_param(&self, key: ParamKey) -> Result<u32> {
        self.config.params.get(key)
    }

    /// Changes a parameter, checking its class against the connection state.
    ///
    /// Timeouts, references and the PDU request apply from the next connect.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the key is server-only, the class
    /// forbids the change now, or the value is out of range.
    pub fn set_param(&mut self, key: ParamKey, value: u32) -> Result<()> {
        let connected = self.get_connected();
        let result = self.config.params.set(key, value, connected);
        self.record(result)
    }

    // ---------------------------------------------------------------------
    // Session password
    // ---------------------------------------------------------------------

    /// Sends the session password (at most 8 characters).
    ///
    /// # Errors
    ///
    /// - `Validation` if the password is longer than 8 bytes
    /// - `Auth` if the controller rejects it
    pub fn set_session_password(&mut self, password: &str) -> Result<()> {
        if password.len() > 8 {
            let err = S7Error::validation(CLI_INVALID_PARAMS, "password longer than 8 characters");
            return self.record(Err(err));
        }
        self.with_session(|session| {
            session
                .user_data(&UserDataCommand::set_password(password))
                .map_err(as_auth_error)
        })?;
        self.password_set = true;
        Ok(())
    }

    /// Clears the session password.
    pub fn clear_session_password(&mut self) -> Result<()> {
        self.with_session(|session| session.user_data(&UserDataCommand::clear_password()))?;
        self.password_set = false;
        Ok(())
    }

    /// Returns true once a session password has been accepted on this connection.
    pub fn has_session_password(&self) -> bool {
        self.password_set
    }

    // ---------------------------------------------------------------------
    // Area access
    // ---------------------------------------------------------------------

    /// Reads `amount × word size` bytes from an area.
    ///
    /// # Errors
    ///
    /// - `Validation` if the address is invalid
    /// - `Protocol` with the controller's code if it rejects the address
    ///
    /// # Example
    ///
    /// ```no_run
    /// use s7_client::{Area, Client, ClientConfig, MemoryAddress};
    ///
    /// let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
    /// client.connect()?;
    /// let flags = client.read_area(MemoryAddress::new(Area::Merkers, 0, 0, 8))?;
    /// assert_eq!(flags.len(), 8);
    /// # Ok::<(), s7_client::S7Error>(())
    /// ```
    pub fn read_area(&mut self, address: MemoryAddress) -> Result<Vec<u8>> {
        self.record(address.validate())?;
        self.with_session(|session| session.read_area(&address))
    }

    /// Writes `data` to an area.
    ///
    /// `data` must hold exactly `amount × word size` bytes; otherwise the
    /// call fails before anything is sent.
    ///
    /// # Errors
    ///
    /// - `Validation` if the address is invalid or the size does not match
    /// - `Protocol` with the controller's code if it rejects the address
    pub fn write_area(&mut self, address: MemoryAddress, data: &[u8]) -> Result<()> {
        self.record(address.validate().and_then(|()| check_write_size(&address, data)))?;
        self.with_session(|session| session.write_area(&address, data))
    }

    /// Reads `size` bytes of a data block.
    pub fn db_read(&mut self, db_number: u16, start: u32, size: u16) -> Result<Vec<u8>> {
        self.read_area(MemoryAddress::db(db_number, start, size))
    }

    /// Writes bytes into a data block.
    pub fn db_write(&mut self, db_number: u16, start: u32, data: &[u8]) -> Result<()> {
        let address = MemoryAddress::db(db_number, start, byte_count(data)?);
        self.write_area(address, data)
    }

    /// Reads process outputs.
    pub fn ab_read(&mut self, start: u32, size: u16) -> Result<Vec<u8>> {
        self.read_area(MemoryAddress::new(Area::ProcessOutputs, 0, start, size))
    }

    /// Writes process outputs.
    pub fn ab_write(&mut self, start: u32, data: &[u8]) -> Result<()> {
        let address = MemoryAddress::new(Area::ProcessOutputs, 0, start, byte_count(data)?);
        self.write_area(address, data)
    }

    /// Reads process inputs.
    pub fn eb_read(&mut self, start: u32, size: u16) -> Result<Vec<u8>> {
        self.read_area(MemoryAddress::new(Area::ProcessInputs, 0, start, size))
    }

    /// Writes process inputs.
    pub fn eb_write(&mut self, start: u32, data: &[u8]) -> Result<()> {
        let address = MemoryAddress::new(Area::ProcessInputs, 0, start, byte_count(data)?);
        self.write_area(address, data)
    }

    /// Reads merkers.
    pub fn mb_read(&mut self, start: u32, size: u16) -> Result<Vec<u8>> {
        self.read_area(MemoryAddress::new(Area::Merkers, 0, start, size))
    }

    /// Writes merkers.
    pub fn mb_write(&mut self, start: u32, data: &[u8]) -> Result<()> {
        let address = MemoryAddress::new(Area::Merkers, 0, start, byte_count(data)?);
        self.write_area(address, data)
    }

    /// Reads `amount` timers (2 bytes each).
    pub fn tm_read(&mut self, start: u32, amount: u16) -> Result<Vec<u8>> {
        self.read_area(MemoryAddress::new(Area::Timers, 0, start, amount))
    }

    /// Writes `amount` timers; `data` must be `amount * 2` bytes.
    pub fn tm_write(&mut self, start: u32, amount: u16, data: &[u8]) -> Result<()> {
        self.write_area(MemoryAddress::new(Area::Timers, 0, start, amount), data)
    }

    /// Reads `amount` counters (2 bytes each).
    pub fn ct_read(&mut self, start: u32, amount: u16) -> Result<Vec<u8>> {
        self.read_area(MemoryAddress::new(Area::Counters, 0, start, amount))
    }

    /// Writes `amount` counters; `data` must be `amount * 2` bytes.
    pub fn ct_write(&mut self, start: u32, amount: u16, data: &[u8]) -> Result<()> {
        self.write_area(MemoryAddress::new(Area::Counters, 0, start, amount), data)
    }

    /// Reads a whole data block, sized from its block info.
    pub fn db_get(&mut self, db_number: u16) -> Result<Vec<u8>> {
        let size = self.get_block_info(BlockType::DB, db_number)?.mc7_size;
        self.db_read(db_number, 0, size)
    }

    /// Fills a whole data block with `filler`.
    pub fn db_fill(&mut self, db_number: u16, filler: u8) -> Result<()> {
        let size = self.get_block_info(BlockType::DB, db_number)?.mc7_size;
        self.db_write(db_number, 0, &vec![filler; usize::from(size)])
    }

    // ---------------------------------------------------------------------
    // PLC control
    // ---------------------------------------------------------------------

    /// Puts the CPU into STOP.
    pub fn plc_stop(&mut self) -> Result<()> {
        self.control(ControlCommand::Stop)
    }

    /// Restarts the CPU keeping retentive data.
    pub fn plc_hot_start(&mut self) -> Result<()> {
        self.control(ControlCommand::HotStart)
    }

    /// Restarts the CPU resetting all data.
    pub fn plc_cold_start(&mut self) -> Result<()> {
        self.control(ControlCommand::ColdStart)
    }

    /// Copies the RAM program into ROM.
    pub fn copy_ram_to_rom(&mut self) -> Result<()> {
        self.control(ControlCommand::CopyRamToRom)
    }

    /// Compresses the user memory.
    pub fn compress(&mut self) -> Result<()> {
        self.control(ControlCommand::Compress)
    }

    fn control(&mut self, command: ControlCommand) -> Result<()> {
        debug!(?command, "PLC control");
        self.with_session(|session| run_control(session, command))
    }

    // ---------------------------------------------------------------------
    // Clock
    // ---------------------------------------------------------------------

    /// Reads the controller clock.
    pub fn get_plc_datetime(&mut self) -> Result<NaiveDateTime> {
        self.with_session(|session| {
            let payload = session.user_data(&UserDataCommand::get_time())?;
            if payload.len() < 10 {
                return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
            }
            get_dt(&payload, 2).map_err(|_| S7Error::protocol(CLI_INVALID_PLC_ANSWER))
        })
    }

    /// Sets the controller clock.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error with `CLI_INVALID_VALUE` for years outside
    /// 1990-2089, the range of an S7 DATE_AND_TIME.
    pub fn set_plc_datetime(&mut self, datetime: NaiveDateTime) -> Result<()> {
        let mut timestamp = [0u8; 10];
        self.record(set_dt(&mut timestamp, 2, datetime))?;
        // the range check above keeps the century at 19 or 20
        timestamp[1] = byte_to_bcd((datetime.year() / 100) as u8);
        self.with_session(|session| session.user_data(&UserDataCommand::set_time(timestamp)))?;
        Ok(())
    }

    /// Sets the controller clock to the local time of this machine.
    pub fn set_plc_system_datetime(&mut self) -> Result<()> {
        self.set_plc_datetime(Local::now().naive_local())
    }

    // ---------------------------------------------------------------------
    // Miscellaneous
    // ---------------------------------------------------------------------

    /// Sends a raw S7 PDU and returns the raw answer.
    ///
    /// # Errors
    ///
    /// - `Validation` with `CLI_INVALID_PARAMS` for an empty buffer
    /// - `Validation` with `CLI_SIZE_OVER_PDU` if the buffer is longer than
    ///   the negotiated PDU length
    pub fn iso_exchange_buffer(&mut self, pdu: &[u8]) -> Result<Vec<u8>> {
        if pdu.is_empty() {
            return self.record(Err(S7Error::validation(CLI_INVALID_PARAMS, "empty PDU")));
        }
        self.with_session(|session| {
            let limit = usize::from(session.pdu_length());
            if pdu.len() > limit {
                return Err(S7Error::validation(
                    CLI_SIZE_OVER_PDU,
                    format!("{} byte PDU, negotiated {limit}", pdu.len()),
                ));
            }
            session.exchange_raw(pdu)
        })
    }

    /// Block upload is not supported.
    pub fn upload(&mut self, _block_type: BlockType, _number: u16) -> Result<Vec<u8>> {
        self.unsupported("upload")
    }

    /// Full block upload is not supported.
    pub fn full_upload(&mut self, _block_type: BlockType, _number: u16) -> Result<Vec<u8>> {
        self.unsupported("full_upload")
    }

    /// Block download is not supported.
    pub fn download(&mut self, _number: u16, _data: &[u8]) -> Result<()> {
        self.unsupported("download")
    }

    /// Block deletion is not supported.
    pub fn delete_block(&mut self, _block_type: BlockType, _number: u16) -> Result<()> {
        self.unsupported("delete_block")
    }

    pub(crate) fn unsupported<R>(&mut self, function: &'static str) -> Result<R> {
        self.record(Err(S7Error::Unsupported { function }))
    }

    // ---------------------------------------------------------------------
    // Plumbing
    // ---------------------------------------------------------------------

    /// Stores the outcome as last error; a lost connection marks the client
    /// disconnected.
    pub(crate) fn record<R>(&mut self, result: Result<R>) -> Result<R> {
        match &result {
            Ok(_) => self.last_error = 0,
            Err(err) => self.note_error(err),
        }
        result
    }

    /// Stores `err` as last error and drops the connection if it was lost.
    fn note_error(&mut self, err: &S7Error) {
        self.last_error = err.code();
        if err.is_connection() && self.state != ConnectionState::Disconnected {
            warn!(error = %err, "connection lost");
            self.session.lock().transport.close();
            self.state = ConnectionState::Disconnected;
            self.password_set = false;
        }
    }

    /// Releases the job slot if its job has finished.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error with `CLI_JOB_PENDING` while a job is
    /// still running on this connection.
    pub(crate) fn ensure_idle(&mut self) -> Result<()> {
        if self.job.as_ref().is_some_and(AsyncJob::is_running) {
            return Err(S7Error::validation(
                CLI_JOB_PENDING,
                "an asynchronous job is still running",
            ));
        }
        if let Some(err) = self.job.take().and_then(|job| job.failure()) {
            if err.is_connection() {
                self.note_error(&err);
            }
        }
        Ok(())
    }

    /// Runs `f` against the session of a connected, idle client and records
    /// the outcome.
    pub(crate) fn with_session<R>(
        &mut self,
        f: impl FnOnce(&mut Session<T>) -> Result<R>,
    ) -> Result<R> {
        let idle = self.ensure_idle();
        self.record(idle)?;
        if !self.get_connected() {
            return self.record(Err(S7Error::not_connected()));
        }
        let started = Instant::now();
        let result = {
            let mut session = self.session.lock();
            f(&mut *session)
        };
        self.exec_time = started.elapsed();
        self.record(result)
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<T: Transport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("rack", &self.config.rack)
            .field("slot", &self.config.slot)
            .field("state", &self.state)
            .field("last_error", &format_args!("{:#010X}", self.last_error))
            .finish()
    }
}

pub(crate) fn byte_count(data: &[u8]) -> Result<u16> {
    u16::try_from(data.len())
        .map_err(|_| S7Error::validation(CLI_INVALID_PARAMS, "more than 65535 bytes"))
}

fn as_auth_error(err: S7Error) -> S7Error {
    match err {
        S7Error::Protocol { code } => S7Error::Auth { code },
        other => other,
    }
}

/// Interprets the answer to a PLC control request.
/// Sends a control request and translates the refusal reasons.
pub(crate) fn run_control<T: Transport>(
    session: &mut Session<T>,
    command: ControlCommand,
) -> Result<()> {
    let response = session.exchange(&command.to_request())?;
    control_result(command, &response)
}

fn control_result(command: ControlCommand, response: &S7Response) -> Result<()> {
    response.check()?;
    if response.function() == Some(command.function()) {
        return Ok(());
    }
    let (already, refused) = match command {
        ControlCommand::Stop => (Some((0x07, CLI_ALREADY_STOP)), CLI_CANNOT_STOP_PLC),
        ControlCommand::HotStart | ControlCommand::ColdStart => {
            (Some((0x03, CLI_ALREADY_RUN)), CLI_CANNOT_START_PLC)
        }
        ControlCommand::CopyRamToRom => (None, CLI_CANNOT_COPY_RAM_TO_ROM),
        ControlCommand::Compress => (None, CLI_CANNOT_COMPRESS),
    };
    if let Some((marker, code)) = already {
        if response.params.get(1) == Some(&marker) {
            return Err(S7Error::protocol(code));
        }
    }
    Err(S7Error::protocol(refused))
}
