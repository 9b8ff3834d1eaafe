//! Connection and timing parameters.
//!
//! Parameters are addressed by a [`ParamKey`] and carry an integer value.
//! Each key belongs to a [`ParamClass`] that decides when it may be read or
//! changed. The [`ParamStore`] holds the live values of one client.
//!
//! | Key | Id | Default | Class |
//! |-----|---:|--------:|-------|
//! | `RemotePort` | 2 | 102 | pre-connect only |
//! | `PingTimeout` | 3 | 750 ms | either |
//! | `SendTimeout` | 4 | 10 ms | either |
//! | `RecvTimeout` | 5 | 3000 ms | either |
//! | `SrcRef` | 7 | 256 | either |
//! | `DstRef` | 8 | 0 | either |
//! | `SrcTSap` | 9 | 256 | either |
//! | `PDURequest` | 10 | 480 | either |
//!
//! Ids 1, 6 and 11-15 belong to the server side and are rejected.
//!
//! # Example
//!
//! ```
//! use s7_client::{ParamKey, ParamStore};
//!
//! let mut params = ParamStore::default();
//! params.set(ParamKey::PingTimeout, 800, false)?;
//! assert_eq!(params.get(ParamKey::PingTimeout)?, 800);
//!
//! // Server keys are not meaningful for a client.
//! assert!(params.get(ParamKey::MaxClients).is_err());
//! # Ok::<(), s7_client::S7Error>(())
//! ```

use std::time::Duration;

use crate::error::{Result, S7Error};
use crate::status::{CLI_CANNOT_CHANGE_PARAM, CLI_INVALID_PARAMS, CLI_INVALID_PARAM_NUMBER};

/// Default ISO-on-TCP port.
pub const DEFAULT_PORT: u16 = 102;

/// Smallest PDU size that may be requested.
pub const MIN_PDU_REQUEST: u16 = 240;

/// Largest PDU size that may be requested.
pub const MAX_PDU_REQUEST: u16 = 960;

/// Enumerated parameter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum ParamKey {
    LocalPort,
    RemotePort,
    PingTimeout,
    SendTimeout,
    RecvTimeout,
    WorkInterval,
    SrcRef,
    DstRef,
    SrcTSap,
    PDURequest,
    MaxClients,
    BSendTimeout,
    BRecvTimeout,
    RecoveryTime,
    KeepAliveTime,
}

/// When a parameter may be read or changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Changeable only while disconnected; readable at any time.
    PreConnectOnly,
    /// Changeable only while connected.
    PostConnectOnly,
    /// Changeable at any time.
    Either,
    /// Meaningful only for a server; never readable or changeable here.
    ServerOnly,
}

impl ParamKey {
    /// Numeric id of the key.
    pub fn id(self) -> u8 {
        match self {
            ParamKey::LocalPort => 1,
            ParamKey::RemotePort => 2,
            ParamKey::PingTimeout => 3,
            ParamKey::SendTimeout => 4,
            ParamKey::RecvTimeout => 5,
            ParamKey::WorkInterval => 6,
            ParamKey::SrcRef => 7,
            ParamKey::DstRef => 8,
            ParamKey::SrcTSap => 9,
            ParamKey::PDURequest => 10,
            ParamKey::MaxClients => 11,
            ParamKey::BSendTimeout => 12,
            ParamKey::BRecvTimeout => 13,
            ParamKey::RecoveryTime => 14,
            ParamKey::KeepAliveTime => 15,
        }
    }

    /// Looks a key up by its numeric id.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for ids outside 1-15.
    pub fn from_id(id: u8) -> Result<Self> {
        let key = match id {
            1 => ParamKey::LocalPort,
            2 => ParamKey::RemotePort,
            3 => ParamKey::PingTimeout,
            4 => ParamKey::SendTimeout,
            5 => ParamKey::RecvTimeout,
            6 => ParamKey::WorkInterval,
            7 => ParamKey::SrcRef,
            8 => ParamKey::DstRef,
            9 => ParamKey::SrcTSap,
            10 => ParamKey::PDURequest,
            11 => ParamKey::MaxClients,
            12 => ParamKey::BSendTimeout,
            13 => ParamKey::BRecvTimeout,
            14 => ParamKey::RecoveryTime,
            15 => ParamKey::KeepAliveTime,
            _ => {
                return Err(S7Error::validation(
                    CLI_INVALID_PARAM_NUMBER,
                    format!("unknown parameter id {id}"),
                ))
            }
        };
        Ok(key)
    }

    /// Validity class of the key.
    pub fn class(self) -> ParamClass {
        match self {
            ParamKey::RemotePort => ParamClass::PreConnectOnly,
            ParamKey::PingTimeout
            | ParamKey::SendTimeout
            | ParamKey::RecvTimeout
            | ParamKey::SrcRef
            | ParamKey::DstRef
            | ParamKey::SrcTSap
            | ParamKey::PDURequest => ParamClass::Either,
            ParamKey::LocalPort
            | ParamKey::WorkInterval
            | ParamKey::MaxClients
            | ParamKey::BSendTimeout
            | ParamKey::BRecvTimeout
            | ParamKey::RecoveryTime
            | ParamKey::KeepAliveTime => ParamClass::ServerOnly,
        }
    }

    fn server_only(self) -> S7Error {
        S7Error::validation(
            CLI_INVALID_PARAM_NUMBER,
            format!("{self:?} is a server parameter"),
        )
    }
}

/// Live parameter values of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamStore {
    remote_port: u16,
    ping_timeout: u32,
    send_timeout: u32,
    recv_timeout: u32,
    src_ref: u16,
    dst_ref: u16,
    src_tsap: u16,
    pdu_request: u16,
}

impl Default for ParamStore {
    fn default() -> Self {
        Self {
            remote_port: DEFAULT_PORT,
            ping_timeout: 750,
            send_timeout: 10,
            recv_timeout: 3000,
            src_ref: 0x0100,
            dst_ref: 0x0000,
            src_tsap: 0x0100,
            pdu_request: 480,
        }
    }
}

impl ParamStore {
    /// Returns the current value of `key`.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for server-only keys.
    pub fn get(&self, key: ParamKey) -> Result<u32> {
        let value = match key {
            ParamKey::RemotePort => u32::from(self.remote_port),
            ParamKey::PingTimeout => self.ping_timeout,
            ParamKey::SendTimeout => self.send_timeout,
            ParamKey::RecvTimeout => self.recv_timeout,
            ParamKey::SrcRef => u32::from(self.src_ref),
            ParamKey::DstRef => u32::from(self.dst_ref),
            ParamKey::SrcTSap => u32::from(self.src_tsap),
            ParamKey::PDURequest => u32::from(self.pdu_request),
            _ => return Err(key.server_only()),
        };
        Ok(value)
    }

    /// Changes `key` after checking its class against the connection state.
    ///
    /// # Errors
    ///
    /// - `Validation` with `CLI_INVALID_PARAM_NUMBER` for server-only keys
    /// - `Validation` with `CLI_CANNOT_CHANGE_PARAM` when the class forbids
    ///   the change in the current state
    /// - `Validation` with `CLI_INVALID_PARAMS` when the value is out of range
    pub fn set(&mut self, key: ParamKey, value: u32, connected: bool) -> Result<()> {
        match key.class() {
            ParamClass::ServerOnly => return Err(key.server_only()),
            ParamClass::PreConnectOnly if connected => {
                return Err(S7Error::validation(
                    CLI_CANNOT_CHANGE_PARAM,
                    format!("{key:?} cannot be changed while connected"),
                ))
            }
            ParamClass::PostConnectOnly if !connected => {
                return Err(S7Error::validation(
                    CLI_CANNOT_CHANGE_PARAM,
                    format!("{key:?} can only be changed while connected"),
                ))
            }
            _ => {}
        }

        match key {
            ParamKey::RemotePort => self.remote_port = narrow(key, value)?,
            ParamKey::PingTimeout => self.ping_timeout = positive(key, value)?,
            ParamKey::SendTimeout => self.send_timeout = positive(key, value)?,
            ParamKey::RecvTimeout => self.recv_timeout = positive(key, value)?,
            ParamKey::SrcRef => self.src_ref = narrow(key, value)?,
            ParamKey::DstRef => self.dst_ref = narrow(key, value)?,
            ParamKey::SrcTSap => self.src_tsap = narrow(key, value)?,
            ParamKey::PDURequest => {
                let pdu: u16 = narrow(key, value)?;
                if !(MIN_PDU_REQUEST..=MAX_PDU_REQUEST).contains(&pdu) {
                    return Err(S7Error::validation(
                        CLI_INVALID_PARAMS,
                        format!("PDURequest must be {MIN_PDU_REQUEST}-{MAX_PDU_REQUEST}, got {value}"),
                    ));
                }
                self.pdu_request = pdu;
            }
            _ => return Err(key.server_only()),
        }
        Ok(())
    }

    /// Port used when connecting.
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Timeout of the TCP connect attempt.
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.ping_timeout))
    }

    /// Socket write timeout.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.send_timeout))
    }

    /// Socket read timeout.
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.recv_timeout))
    }

    /// ISO source reference sent in the connection request.
    pub fn src_ref(&self) -> u16 {
        self.src_ref
    }

    /// ISO destination reference sent in the connection request.
    pub fn dst_ref(&self) -> u16 {
        self.dst_ref
    }

    /// Local TSAP.
    pub fn src_tsap(&self) -> u16 {
        self.src_tsap
    }

    /// PDU length proposed during negotiation.
    pub fn pdu_request(&self) -> u16 {
        self.pdu_request
    }

    pub(crate) fn force_remote_port(&mut self, port: u16) {
        self.remote_port = port;
    }

    pub(crate) fn force_recv_timeout(&mut self, timeout: Duration) {
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        self.recv_timeout = millis.max(1);
    }
}

fn narrow(key: ParamKey, value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| {
        S7Error::validation(
            CLI_INVALID_PARAMS,
            format!("{key:?} must fit in 16 bits, got {value}"),
        )
    })
}

fn positive(key: ParamKey, value: u32) -> Result<u32> {
    if value == 0 {
        return Err(S7Error::validation(
            CLI_INVALID_PARAMS,
            format!("{key:?} must be greater than 0"),
        ));
    }
    Ok(value)
}
