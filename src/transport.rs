//! Transport layer for S7 communication.
//!
//! The client hands fully formed S7 PDUs to a [`Transport`] and receives
//! fully formed response PDUs back. The transport knows nothing about S7;
//! the protocol layer knows nothing about sockets.
//!
//! [`IsoTcpTransport`] is the production implementation: ISO-on-TCP
//! (RFC 1006 TPKT framing with ISO 8073 COTP) over a blocking
//! `std::net::TcpStream`.
//!
//! # Framing
//!
//! | Bytes | Field | Description |
//! |-------|-------|-------------|
//! | 0 | TPKT version | Always 0x03 |
//! | 1 | Reserved | 0x00 |
//! | 2-3 | Length | Total frame length including TPKT |
//! | 4 | COTP length | 0x02 for data frames |
//! | 5 | COTP type | 0xF0 (DT), 0xE0 (CR), 0xD0 (CC) |
//! | 6 | EOT / number | Bit 7 set on the last fragment |
//!
//! # Example
//!
//! The transport is normally driven by the [`Client`](crate::Client), but
//! it can be used directly for custom tooling:
//!
//! ```no_run
//! use s7_client::{ConnectTarget, IsoTcpTransport, Transport};
//!
//! let mut transport = IsoTcpTransport::new();
//! transport.open(&ConnectTarget::new("192.168.0.1", 0x0100, 0x0102))?;
//! assert!(transport.is_open());
//! transport.close();
//! # Ok::<(), s7_client::S7Error>(())
//! ```

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{connect_error, Result, S7Error};
use crate::params::{ParamStore, DEFAULT_PORT};
use crate::status::{
    ISO_CONNECT, ISO_INVALID_DATA_SIZE, ISO_INVALID_PDU, ISO_SHORT_PACKET, ISO_TOO_MANY_FRAGMENTS, TCP_DATA_SEND,
    TCP_UNREACHABLE_HOST,
};

/// TPKT version byte.
pub const TPKT_VERSION: u8 = 0x03;

/// TPKT plus COTP data header length.
pub const ISO_HEADER_SIZE: usize = 7;

const COTP_CR: u8 = 0xE0;
const COTP_CC: u8 = 0xD0;
const COTP_DT: u8 = 0xF0;
const COTP_EOT: u8 = 0x80;
const MAX_FRAGMENTS: usize = 64;

/// Everything needed to open a session with a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Local TSAP sent in the connection request.
    pub local_tsap: u16,
    /// Remote TSAP (connection type and rack/slot).
    pub remote_tsap: u16,
    /// ISO source reference.
    pub src_ref: u16,
    /// ISO destination reference.
    pub dst_ref: u16,
    /// Timeout of the TCP connect attempt.
    pub connect_timeout: Duration,
    /// Socket write timeout.
    pub send_timeout: Duration,
    /// Socket read timeout.
    pub recv_timeout: Duration,
}

impl ConnectTarget {
    /// Creates a target using the default port and timing parameters.
    pub fn new(host: impl Into<String>, local_tsap: u16, remote_tsap: u16) -> Self {
        let params = ParamStore::default();
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            local_tsap,
            remote_tsap,
            src_ref: params.src_ref(),
            dst_ref: params.dst_ref(),
            connect_timeout: params.ping_timeout(),
            send_timeout: params.send_timeout(),
            recv_timeout: params.recv_timeout(),
        }
    }

    /// Creates a target taking port, references and timeouts from `params`.
    pub(crate) fn from_params(host: &str, local_tsap: u16, remote_tsap: u16, params: &ParamStore) -> Self {
        Self {
            host: host.to_string(),
            port: params.remote_port(),
            local_tsap,
            remote_tsap,
            src_ref: params.src_ref(),
            dst_ref: params.dst_ref(),
            connect_timeout: params.ping_timeout(),
            send_timeout: params.send_timeout(),
            recv_timeout: params.recv_timeout(),
        }
    }
}

/// Byte-level collaborator that carries S7 PDUs to a controller.
///
/// Implementations must make [`close`](Transport::close) idempotent.
pub trait Transport: Send + 'static {
    /// Opens the session described by `target`.
    fn open(&mut self, target: &ConnectTarget) -> Result<()>;

    /// Returns true while the session is open.
    fn is_open(&self) -> bool;

    /// Sends one request PDU and returns the response PDU.
    ///
    /// # Errors
    ///
    /// Returns a `Connection` error if the session is closed or breaks.
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>>;

    /// Closes the session. Calling it on a closed transport does nothing.
    fn close(&mut self);
}

/// ISO-on-TCP transport.
#[derive(Default)]
pub struct IsoTcpTransport {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
}

impl IsoTcpTransport {
    /// Creates a closed transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(S7Error::not_connected)
    }
}

/// Builds the COTP connection request frame.
pub(crate) fn connection_request(target: &ConnectTarget) -> [u8; 22] {
    let [dst_hi, dst_lo] = target.dst_ref.to_be_bytes();
    let [src_hi, src_lo] = target.src_ref.to_be_bytes();
    let [local_hi, local_lo] = target.local_tsap.to_be_bytes();
    let [remote_hi, remote_lo] = target.remote_tsap.to_be_bytes();
    [
        TPKT_VERSION, 0x00, 0x00, 22,
        0x11, COTP_CR, dst_hi, dst_lo, src_hi, src_lo, 0x00,
        0xC0, 0x01, 0x0A,
        0xC1, 0x02, local_hi, local_lo,
        0xC2, 0x02, remote_hi, remote_lo,
    ]
}

/// Wraps an S7 PDU into a single TPKT/COTP data frame.
///
/// # Errors
///
/// Returns a `Validation` error with `ISO_INVALID_DATA_SIZE` if the frame
/// length does not fit the 16-bit TPKT length field.
pub(crate) fn data_frame(pdu: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(pdu.len() + ISO_HEADER_SIZE).map_err(|_| {
        S7Error::validation(
            ISO_INVALID_DATA_SIZE,
            format!("{} byte PDU exceeds a TPKT frame", pdu.len()),
        )
    })?;
    let mut frame = Vec::with_capacity(usize::from(len));
    frame.extend_from_slice(&[TPKT_VERSION, 0x00]);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&[0x02, COTP_DT, COTP_EOT]);
    frame.extend_from_slice(pdu);
    Ok(frame)
}

/// Reads one TPKT frame and returns its content after the TPKT header.
fn read_tpkt(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut head = [0u8; 4];
    stream.read_exact(&mut head)?;
    if head[0] != TPKT_VERSION {
        return Err(S7Error::connection(ISO_INVALID_PDU, "invalid TPKT version"));
    }
    let len = usize::from(u16::from_be_bytes([head[2], head[3]]));
    if len < ISO_HEADER_SIZE {
        return Err(S7Error::connection(ISO_SHORT_PACKET, format!("TPKT length {len}")));
    }
    let mut body = vec![0u8; len - 4];
    stream.read_exact(&mut body)?;
    Ok(body)
}

impl Transport for IsoTcpTransport {
    fn open(&mut self, target: &ConnectTarget) -> Result<()> {
        self.close();

        let addr = (target.host.as_str(), target.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                S7Error::connection(TCP_UNREACHABLE_HOST, format!("cannot resolve {}", target.host))
            })?;
        let mut stream = TcpStream::connect_timeout(&addr, target.connect_timeout).map_err(connect_error)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(target.recv_timeout))?;
        stream.set_write_timeout(Some(target.send_timeout))?;

        stream
            .write_all(&connection_request(target))
            .map_err(|e| S7Error::connection(TCP_DATA_SEND, e.to_string()))?;
        let confirm = read_tpkt(&mut stream)?;
        if confirm.len() < 2 || confirm[1] != COTP_CC {
            return Err(S7Error::connection(ISO_CONNECT, "connection request refused"));
        }

        debug!(%addr, local_tsap = target.local_tsap, remote_tsap = target.remote_tsap, "ISO session open");
        self.stream = Some(stream);
        self.peer = Some(addr);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let frame = data_frame(request)?;
        let stream = self.stream()?;
        trace!(pdu = ?request, "send");
        stream
            .write_all(&frame)
            .map_err(|e| S7Error::connection(TCP_DATA_SEND, e.to_string()))?;

        let mut pdu = Vec::new();
        for _ in 0..MAX_FRAGMENTS {
            let body = read_tpkt(stream)?;
            if body.len() < 3 || body[0] != 0x02 || body[1] != COTP_DT {
                return Err(S7Error::connection(ISO_INVALID_PDU, "unexpected COTP frame"));
            }
            pdu.extend_from_slice(&body[3..]);
            if body[2] & COTP_EOT != 0 {
                trace!(pdu = ?pdu, "recv");
                return Ok(pdu);
            }
        }
        Err(S7Error::connection(ISO_TOO_MANY_FRAGMENTS, "response never completed"))
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(peer = ?self.peer, "ISO session closed");
        }
        self.peer = None;
    }
}

impl std::fmt::Debug for IsoTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsoTcpTransport")
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for IsoTcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TCP_NOT_CONNECTED;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_connection_request_layout() {
        let mut target = ConnectTarget::new("127.0.0.1", 0x0100, 0x0102);
        target.src_ref = 0x0100;
        let frame = connection_request(&target);
        assert_eq!(
            hex::encode(frame),
            "0300001611e00000010000c0010ac1020100c2020102"
        );
    }

    #[test]
    fn test_data_frame() {
        let frame = data_frame(&[0x32, 0x01]).unwrap();
        assert_eq!(frame, vec![0x03, 0x00, 0x00, 0x09, 0x02, 0xF0, 0x80, 0x32, 0x01]);
    }

    #[test]
    fn test_data_frame_length_limit() {
        let largest = vec![0u8; usize::from(u16::MAX) - ISO_HEADER_SIZE];
        let frame = data_frame(&largest).unwrap();
        assert_eq!(&frame[2..4], &[0xFF, 0xFF]);

        let err = data_frame(&vec![0u8; largest.len() + 1]).unwrap_err();
        assert_eq!(err.code(), ISO_INVALID_DATA_SIZE);
        assert!(!err.is_connection());
    }

    #[test]
    fn test_closed_transport() {
        let mut transport = IsoTcpTransport::new();
        assert!(!transport.is_open());
        let err = transport.exchange(&[0x32]).unwrap_err();
        assert_eq!(err.code(), TCP_NOT_CONNECTED);
        transport.close();
        transport.close();
    }

    #[test]
    fn test_open_and_fragmented_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 22];
            socket.read_exact(&mut request).unwrap();
            assert_eq!(request[5], COTP_CR);
            socket
                .write_all(&hex::decode("0300001611d00100000100c0010ac1020100c2020102").unwrap())
                .unwrap();

            let mut data = [0u8; 9];
            socket.read_exact(&mut data).unwrap();
            assert_eq!(&data[7..], &[0x32, 0x01]);
            socket.write_all(&[0x03, 0x00, 0x00, 0x09, 0x02, 0xF0, 0x00, 0xAA, 0xBB]).unwrap();
            socket.write_all(&[0x03, 0x00, 0x00, 0x08, 0x02, 0xF0, 0x80, 0xCC]).unwrap();
        });

        let mut target = ConnectTarget::new("127.0.0.1", 0x0100, 0x0102);
        target.port = port;
        target.recv_timeout = Duration::from_secs(2);
        target.send_timeout = Duration::from_secs(2);
        target.connect_timeout = Duration::from_secs(2);

        let mut transport = IsoTcpTransport::new();
        transport.open(&target).unwrap();
        assert!(transport.is_open());
        assert_eq!(transport.exchange(&[0x32, 0x01]).unwrap(), vec![0xAA, 0xBB, 0xCC]);
        transport.close();
        assert!(!transport.is_open());
        peer.join().unwrap();
    }

    #[test]
    fn test_refused_connection_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 22];
            socket.read_exact(&mut request).unwrap();
            socket.write_all(&[0x03, 0x00, 0x00, 0x07, 0x02, 0x80, 0x00]).unwrap();
        });

        let mut target = ConnectTarget::new("127.0.0.1", 0x0100, 0x0102);
        target.port = port;
        target.recv_timeout = Duration::from_secs(2);
        let err = IsoTcpTransport::new().open(&target).unwrap_err();
        assert_eq!(err.code(), ISO_CONNECT);
        peer.join().unwrap();
    }
}
