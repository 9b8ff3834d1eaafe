//! In-process S7 controller used by the integration tests.
//!
//! It answers S7 PDUs directly at the transport seam: communication setup,
//! read/write var, PLC control and the user data functions (SZL, block
//! directory, password, clock). Long user data answers are fragmented.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use s7_client::{status, Area, Client, ClientConfig, ConnectTarget, S7Error, Transport, WordLen};

pub const SERVER_PDU: u16 = 480;
pub const DB1_SIZE: usize = 1024;
pub const DB2_SIZE: usize = 16;
pub const TIMERS: usize = 64;
pub const COUNTERS: usize = 64;
pub const SERIAL: &str = "S C-C2UR28922012";
pub const ORDER_CODE: &str = "6ES7 315-2EH14-0AB0 ";

struct PlcState {
    open: bool,
    broken: bool,
    refuse_connect: bool,
    exchanges: usize,
    delay: Duration,
    fragment_size: usize,
    pending: VecDeque<Vec<u8>>,
    sequence: u8,
    max_pdu: u16,
    password: Option<String>,
    running: bool,
    clock: [u8; 8],
    memory: HashMap<(Area, u16), Vec<u8>>,
    last_target: Option<ConnectTarget>,
}

/// Simulated controller. Clones share the same state, so a test keeps one
/// clone for inspection and hands the other to the client.
#[derive(Clone)]
pub struct SimulatedPlc {
    state: Arc<Mutex<PlcState>>,
}

impl Default for SimulatedPlc {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlc {
    pub fn new() -> Self {
        let mut memory = HashMap::new();
        memory.insert((Area::ProcessInputs, 0), vec![0; 256]);
        memory.insert((Area::ProcessOutputs, 0), vec![0; 256]);
        memory.insert((Area::Merkers, 0), vec![0; 256]);
        memory.insert((Area::DataBlock, 1), vec![0; DB1_SIZE]);
        memory.insert((Area::DataBlock, 2), vec![0; DB2_SIZE]);
        memory.insert((Area::Timers, 0), vec![0; TIMERS * 2]);
        memory.insert((Area::Counters, 0), vec![0; COUNTERS * 2]);
        Self {
            state: Arc::new(Mutex::new(PlcState {
                open: false,
                broken: false,
                refuse_connect: false,
                exchanges: 0,
                delay: Duration::ZERO,
                fragment_size: 200,
                pending: VecDeque::new(),
                sequence: 0,
                max_pdu: SERVER_PDU,
                password: None,
                running: true,
                // 2019-06-27 10:00:00.000, Thursday
                clock: [0x19, 0x06, 0x27, 0x10, 0x00, 0x00, 0x00, 0x05],
                memory,
                last_target: None,
            })),
        }
    }

    /// Number of PDU exchanges seen so far.
    pub fn exchanges(&self) -> usize {
        self.state.lock().exchanges
    }

    /// Delays every answer.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    /// Largest user data payload sent in one fragment.
    pub fn set_fragment_size(&self, size: usize) {
        self.state.lock().fragment_size = size.max(1);
    }

    pub fn set_max_pdu(&self, pdu: u16) {
        self.state.lock().max_pdu = pdu;
    }

    pub fn set_password(&self, password: Option<&str>) {
        self.state.lock().password = password.map(str::to_string);
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.state.lock().refuse_connect = refuse;
    }

    /// Makes the next exchange fail as if the peer reset the connection.
    pub fn break_link(&self) {
        self.state.lock().broken = true;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn last_target(&self) -> Option<ConnectTarget> {
        self.state.lock().last_target.clone()
    }

    pub fn memory(&self, area: Area, db: u16) -> Vec<u8> {
        self.state.lock().memory.get(&(area, db)).cloned().unwrap_or_default()
    }

    pub fn clock(&self) -> [u8; 8] {
        self.state.lock().clock
    }
}

impl Transport for SimulatedPlc {
    fn open(&mut self, target: &ConnectTarget) -> s7_client::Result<()> {
        let mut state = self.state.lock();
        if state.refuse_connect {
            return Err(S7Error::connection(status::TCP_CONNECTION_FAILED, "connection refused"));
        }
        state.open = true;
        state.broken = false;
        state.pending.clear();
        state.last_target = Some(target.clone());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn exchange(&mut self, request: &[u8]) -> s7_client::Result<Vec<u8>> {
        let delay = self.state.lock().delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state.lock();
        state.exchanges += 1;
        if !state.open {
            return Err(S7Error::not_connected());
        }
        if state.broken {
            state.open = false;
            return Err(S7Error::connection(status::TCP_CONNECTION_RESET, "connection reset by peer"));
        }
        Ok(state.answer(request))
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }
}

/// Client connected to a fresh simulated controller (rack 0, slot 2).
pub fn connected_client() -> (Client<SimulatedPlc>, SimulatedPlc) {
    let plc = SimulatedPlc::new();
    let mut client = Client::with_transport(ClientConfig::new("plc.local", 0, 2), plc.clone());
    client.connect().expect("connect to simulated PLC");
    (client, plc)
}

/// Decodes the wire form of a session password.
pub fn decode_password(encoded: &[u8]) -> String {
    let mut plain = [0u8; 8];
    plain[0] = encoded[0] ^ 0x55;
    plain[1] = encoded[1] ^ 0x55;
    for i in 2..8 {
        plain[i] = encoded[i] ^ 0x55 ^ encoded[i - 2];
    }
    String::from_utf8_lossy(&plain).trim_end().to_string()
}

fn be16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn frame(request: &[u8], rosctr: u8, error: u16, params: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x32, rosctr, 0x00, 0x00, request[4], request[5]];
    out.extend_from_slice(&(params.len() as u16).to_be_bytes());
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    if rosctr == 0x02 || rosctr == 0x03 {
        out.extend_from_slice(&error.to_be_bytes());
    }
    out.extend_from_slice(params);
    out.extend_from_slice(data);
    out
}

struct ItemSpec {
    word_len: u8,
    amount: usize,
    db: u16,
    area: u8,
    address: usize,
}

fn item_specs(params: &[u8]) -> Vec<ItemSpec> {
    let count = usize::from(params[1]);
    (0..count)
        .map(|i| {
            let spec = &params[2 + i * 12..2 + (i + 1) * 12];
            ItemSpec {
                word_len: spec[3],
                amount: usize::from(be16(spec, 4)),
                db: be16(spec, 6),
                area: spec[8],
                address: (usize::from(spec[9]) << 16) | (usize::from(spec[10]) << 8) | usize::from(spec[11]),
            }
        })
        .collect()
}

fn transport_size(word_len: u8) -> u8 {
    match word_len {
        0x01 => 0x03,
        0x05 | 0x07 => 0x05,
        0x08 => 0x07,
        0x03 | 0x1C | 0x1D => 0x09,
        _ => 0x04,
    }
}

fn record(index: u16, text: &str, len: usize) -> Vec<u8> {
    let mut record = index.to_be_bytes().to_vec();
    record.extend_from_slice(text.as_bytes());
    record.resize(len, 0);
    record
}

fn component_text(index: u16) -> &'static str {
    match index {
        1 => "SNAP7-SERVER",
        2 => "CPU 315-2 PN/DP",
        4 => "Original Siemens Equipment",
        5 => SERIAL,
        7 => "CPU 315-2 PN/DP",
        _ => "",
    }
}

impl PlcState {
    fn answer(&mut self, request: &[u8]) -> Vec<u8> {
        let param_len = usize::from(be16(request, 6));
        let data_len = usize::from(be16(request, 8));
        let params = request[10..10 + param_len].to_vec();
        let data = request[10 + param_len..10 + param_len + data_len].to_vec();
        match request[1] {
            0x01 => self.job(request, &params, &data),
            0x07 => self.user_data(request, &params, &data),
            _ => frame(request, 0x03, 0x8104, &[], &[]),
        }
    }

    fn job(&mut self, request: &[u8], params: &[u8], data: &[u8]) -> Vec<u8> {
        match params[0] {
            0xF0 => {
                let granted = be16(params, 6).min(self.max_pdu);
                let mut answer = params[..6].to_vec();
                answer.extend_from_slice(&granted.to_be_bytes());
                frame(request, 0x03, 0, &answer, &[])
            }
            0x04 => self.read_var(request, params),
            0x05 => self.write_var(request, params, data),
            0x28 | 0x29 => self.control(request, params),
            _ => frame(request, 0x03, 0x8104, &[], &[]),
        }
    }

    /// Memory key, byte offset and byte length of an item, or its return code.
    fn locate(&self, item: &ItemSpec) -> Result<((Area, u16), usize, usize), u8> {
        let area = Area::from_code(item.area).ok_or(0x0A)?;
        let word_len = WordLen::from_code(item.word_len).ok_or(0x06)?;
        let db = if area == Area::DataBlock { item.db } else { 0 };
        let (offset, len) = match word_len {
            WordLen::Bit => (item.address / 8, 1),
            WordLen::Counter | WordLen::Timer => (item.address * 2, item.amount * 2),
            other => (item.address / 8, item.amount * other.size()),
        };
        let memory = self.memory.get(&(area, db)).ok_or(0x0A)?;
        if offset + len > memory.len() {
            return Err(0x05);
        }
        Ok(((area, db), offset, len))
    }

    fn read_var(&mut self, request: &[u8], params: &[u8]) -> Vec<u8> {
        let items = item_specs(params);
        let last = items.len().saturating_sub(1);
        let mut data = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match self.locate(item) {
                Ok((key, offset, len)) => {
                    let memory = &self.memory[&key];
                    let bytes = if item.word_len == 0x01 {
                        vec![(memory[offset] >> (item.address % 8)) & 1]
                    } else {
                        memory[offset..offset + len].to_vec()
                    };
                    let ts = transport_size(item.word_len);
                    let wire_len = match ts {
                        0x04 | 0x05 => bytes.len() * 8,
                        _ => bytes.len(),
                    };
                    data.extend_from_slice(&[0xFF, ts]);
                    data.extend_from_slice(&(wire_len as u16).to_be_bytes());
                    data.extend_from_slice(&bytes);
                    if bytes.len() % 2 == 1 && index != last {
                        data.push(0x00);
                    }
                }
                Err(code) => data.extend_from_slice(&[code, 0x00, 0x00, 0x00]),
            }
        }
        frame(request, 0x03, 0, &[0x04, items.len() as u8], &data)
    }

    fn write_var(&mut self, request: &[u8], params: &[u8], data: &[u8]) -> Vec<u8> {
        let items = item_specs(params);
        let last = items.len().saturating_sub(1);
        let mut codes = Vec::new();
        let mut offset = 0;
        for (index, item) in items.iter().enumerate() {
            let ts = data[offset + 1];
            let wire_len = usize::from(be16(data, offset + 2));
            let len = match ts {
                0x04 | 0x05 => wire_len.div_ceil(8),
                _ => wire_len,
            };
            let bytes = data[offset + 4..offset + 4 + len].to_vec();
            offset += 4 + len;
            if len % 2 == 1 && index != last {
                offset += 1;
            }

            let code = match self.locate(item) {
                Ok((key, start, expected)) => {
                    let memory = self.memory.get_mut(&key).expect("located area exists");
                    if item.word_len == 0x01 {
                        let mask = 1 << (item.address % 8);
                        if bytes[0] & 1 == 1 {
                            memory[start] |= mask;
                        } else {
                            memory[start] &= !mask;
                        }
                        0xFF
                    } else if bytes.len() != expected {
                        0x07
                    } else {
                        memory[start..start + expected].copy_from_slice(&bytes);
                        0xFF
                    }
                }
                Err(code) => code,
            };
            codes.push(code);
        }
        frame(request, 0x03, 0, &[0x05, items.len() as u8], &codes)
    }

    fn control(&mut self, request: &[u8], params: &[u8]) -> Vec<u8> {
        let names = |needle: &[u8]| params.windows(needle.len()).any(|w| w == needle);
        let answer: Vec<u8> = if params[0] == 0x29 {
            if self.running {
                self.running = false;
                vec![0x29]
            } else {
                vec![0x00, 0x07]
            }
        } else if names(b"P_PROGRAM") {
            if self.running {
                vec![0x00, 0x03]
            } else {
                self.running = true;
                vec![0x28]
            }
        } else {
            vec![0x28]
        };
        frame(request, 0x03, 0, &answer, &[])
    }

    fn user_data(&mut self, request: &[u8], params: &[u8], data: &[u8]) -> Vec<u8> {
        let group = params[5] & 0x0F;
        let sub = params[6];
        if params[4] == 0x12 {
            return match self.pending.pop_front() {
                Some(chunk) => self.fragment(request, group, sub, chunk),
                None => user_data_error(request, group, sub, 0xD0A1),
            };
        }
        let payload: Vec<u8> = if data.len() >= 4 && data[0] == 0xFF {
            data[4..4 + usize::from(be16(data, 2))].to_vec()
        } else {
            Vec::new()
        };

        let result = match (group, sub) {
            (0x4, 0x01) => self.szl(be16(&payload, 0), be16(&payload, 2)),
            (0x3, 0x01) => Ok(self.block_counts()),
            (0x3, 0x02) => Ok(self.block_numbers(payload[1])),
            (0x3, 0x03) => self.block_info(&payload),
            (0x5, 0x01) => self.check_password(&payload),
            (0x5, 0x02) => Ok(Vec::new()),
            (0x7, 0x01) => {
                let mut clock = vec![0x00, 0x20];
                clock.extend_from_slice(&self.clock);
                Ok(clock)
            }
            (0x7, 0x02) => {
                self.clock.copy_from_slice(&payload[2..10]);
                Ok(Vec::new())
            }
            _ => Err(0x8104),
        };

        match result {
            Ok(answer) => {
                self.pending = if answer.is_empty() {
                    VecDeque::from(vec![Vec::new()])
                } else {
                    answer.chunks(self.fragment_size).map(<[u8]>::to_vec).collect()
                };
                let first = self.pending.pop_front().unwrap_or_default();
                self.fragment(request, group, sub, first)
            }
            Err(code) => user_data_error(request, group, sub, code),
        }
    }

    fn fragment(&mut self, request: &[u8], group: u8, sub: u8, chunk: Vec<u8>) -> Vec<u8> {
        self.sequence = self.sequence.wrapping_add(1);
        let more = u8::from(!self.pending.is_empty());
        let params = [0x00, 0x01, 0x12, 0x08, 0x12, 0x80 | group, sub, self.sequence, 0x01, more, 0x00, 0x00];
        let mut data = vec![0xFF, 0x09];
        data.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
        data.extend_from_slice(&chunk);
        frame(request, 0x07, 0, &params, &data)
    }

    fn szl(&self, id: u16, index: u16) -> Result<Vec<u8>, u16> {
        let (length_dr, records): (u16, Vec<u8>) = match (id, index) {
            (0x0000, _) => (
                2,
                [0x0000u16, 0x0011, 0x0111, 0x001C, 0x011C, 0x0131, 0x0232, 0x0424]
                    .iter()
                    .flat_map(|id| id.to_be_bytes())
                    .collect(),
            ),
            (0x0011, _) => {
                let mut records = record(0x0001, ORDER_CODE, 22);
                records.extend_from_slice(&[0x00, 0xC0, 0x00, 0x03, 0x00, 0x01]);
                records.extend(record(0x0007, "                    ", 22));
                records.extend_from_slice(&[0x00, 0x00, 0x56, 0x03, 0x02, 0x06]);
                (28, records)
            }
            (0x0111, 1) => {
                let mut records = record(0x0001, ORDER_CODE, 22);
                records.extend_from_slice(&[0x00, 0xC0, 0x00, 0x03, 0x00, 0x01]);
                (28, records)
            }
            (0x001C, _) => (34, (1..=10).flat_map(|i| record(i, component_text(i), 34)).collect()),
            (0x011C, i) if (1..=10).contains(&i) => (34, record(i, component_text(i), 34)),
            (0x0131, 1) => {
                let mut cp = vec![0x00, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00];
                cp.resize(40, 0);
                (40, cp)
            }
            (0x0232, 4) => {
                let mut protection = vec![0x00, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02];
                protection.resize(20, 0);
                (20, protection)
            }
            (0x0424, _) => {
                let mut state = vec![0x51, 0x44, 0xFF, if self.running { 0x08 } else { 0x04 }];
                state.resize(20, 0);
                (20, state)
            }
            _ => return Err(0xD401),
        };
        let mut out = id.to_be_bytes().to_vec();
        out.extend_from_slice(&index.to_be_bytes());
        out.extend_from_slice(&length_dr.to_be_bytes());
        out.extend_from_slice(&((records.len() / usize::from(length_dr)) as u16).to_be_bytes());
        out.extend(records);
        Ok(out)
    }

    fn db_numbers(&self) -> Vec<u16> {
        let mut numbers: Vec<u16> = self
            .memory
            .keys()
            .filter(|(area, _)| *area == Area::DataBlock)
            .map(|(_, number)| *number)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    fn block_counts(&self) -> Vec<u8> {
        let dbs = self.db_numbers().len() as u16;
        let mut out = Vec::new();
        for (code, count) in [(0x38u8, 1u16), (0x45, 0), (0x43, 0), (0x46, 0), (0x44, 0), (0x41, dbs), (0x42, 0)] {
            out.extend_from_slice(&[0x30, code]);
            out.extend_from_slice(&count.to_be_bytes());
        }
        out
    }

    fn block_numbers(&self, code: u8) -> Vec<u8> {
        let numbers = match code {
            0x41 => self.db_numbers(),
            0x38 => vec![1],
            _ => Vec::new(),
        };
        numbers
            .iter()
            .flat_map(|n| {
                let [hi, lo] = n.to_be_bytes();
                [hi, lo, 0x22, 0x05]
            })
            .collect()
    }

    fn block_info(&self, payload: &[u8]) -> Result<Vec<u8>, u16> {
        let number: u16 = std::str::from_utf8(&payload[2..7])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or(0xD209u16)?;
        let (sub_type, size) = match payload[1] {
            0x41 => (
                0x0A,
                self.memory.get(&(Area::DataBlock, number)).map(Vec::len).ok_or(0xD209u16)?,
            ),
            0x38 if number == 1 => (0x08, 100),
            _ => return Err(0xD209),
        };
        let mut info = vec![0u8; 78];
        info[1] = payload[1];
        info[9] = 0x01;
        info[10] = 0x05;
        info[11] = sub_type;
        info[12..14].copy_from_slice(&number.to_be_bytes());
        info[14..18].copy_from_slice(&((size + 92) as u32).to_be_bytes());
        info[26..28].copy_from_slice(&0x32A1u16.to_be_bytes());
        info[32..34].copy_from_slice(&0x32A1u16.to_be_bytes());
        info[34..36].copy_from_slice(&42u16.to_be_bytes());
        info[40..42].copy_from_slice(&(size as u16).to_be_bytes());
        info[42..50].copy_from_slice(b"SNAP7\0\0\0");
        info[66] = 0x01;
        Ok(info)
    }

    fn check_password(&self, payload: &[u8]) -> Result<Vec<u8>, u16> {
        match &self.password {
            Some(expected) if decode_password(payload) != *expected => Err(0xD602),
            _ => Ok(Vec::new()),
        }
    }
}

fn user_data_error(request: &[u8], group: u8, sub: u8, code: u16) -> Vec<u8> {
    let [hi, lo] = code.to_be_bytes();
    let params = [0x00, 0x01, 0x12, 0x08, 0x12, 0x80 | group, sub, 0x00, 0x00, 0x00, hi, lo];
    frame(request, 0x07, 0, &params, &[0x0A, 0x00, 0x00, 0x00])
}
