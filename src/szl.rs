//! System status list (SZL) and block directory queries.
//!
//! Long answers arrive in several fragments; the session reassembles them
//! before the records are parsed here.
//!
//! # Example
//!
//! ```no_run
//! use s7_client::{BlockType, Client, ClientConfig};
//!
//! let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
//! client.connect()?;
//!
//! let info = client.get_cpu_info()?;
//! println!("{} ({})", info.module_type_name, info.serial_number);
//!
//! let blocks = client.list_blocks()?;
//! println!("{} data blocks", blocks.db);
//! for number in client.list_blocks_of_type(BlockType::DB, 16)? {
//!     let block = client.get_block_info(BlockType::DB, number)?;
//!     println!("DB{number}: {} bytes", block.mc7_size);
//! }
//! # Ok::<(), s7_client::S7Error>(())
//! ```

use chrono::NaiveDate;
use tracing::debug;

use crate::client::Client;
use crate::command::UserDataCommand;
use crate::error::{Result, S7Error};
use crate::memory::BlockType;
use crate::session::Session;
use crate::status::{CLI_INVALID_DATA_SIZE_RECVD, CLI_INVALID_PLC_ANSWER};
use crate::transport::Transport;

/// SZL id of the list of available SZL ids.
pub const SZL_ID_LIST: u16 = 0x0000;
/// SZL id of the module identification.
pub const SZL_MODULE_ID: u16 = 0x0011;
/// SZL id of the component identification.
pub const SZL_COMPONENT_ID: u16 = 0x001C;
/// SZL id of the communication capability parameters.
pub const SZL_COMM_CAPABILITIES: u16 = 0x0131;
/// SZL id of the protection level.
pub const SZL_PROTECTION: u16 = 0x0232;
/// SZL id of the CPU operating status.
pub const SZL_CPU_STATUS: u16 = 0x0424;

const SZL_HEADER_SIZE: usize = 8;

/// Record layout declared by an SZL answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SzlHeader {
    /// Length of one record in bytes.
    pub length_dr: u16,
    /// Number of records.
    pub n_dr: u16,
}

/// One SZL answer: header plus the concatenated records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SzlList {
    /// Record layout.
    pub header: SzlHeader,
    /// Records, `n_dr * length_dr` bytes.
    pub data: Vec<u8>,
}

impl SzlList {
    /// Parses a reassembled SZL payload (id, index, record length, count, records).
    ///
    /// The record count is recomputed from the bytes actually received.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error if the payload is shorter than its header or
    /// the records are not a whole multiple of the record length.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < SZL_HEADER_SIZE {
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        let length_dr = u16::from_be_bytes([payload[4], payload[5]]);
        let declared = u16::from_be_bytes([payload[6], payload[7]]);
        let data = payload[SZL_HEADER_SIZE..].to_vec();

        let n_dr = match usize::from(length_dr) {
            0 if data.is_empty() => 0,
            0 => return Err(S7Error::protocol(CLI_INVALID_DATA_SIZE_RECVD)),
            len if data.len() % len != 0 => {
                return Err(S7Error::protocol(CLI_INVALID_DATA_SIZE_RECVD))
            }
            len => u16::try_from(data.len() / len)
                .map_err(|_| S7Error::protocol(CLI_INVALID_DATA_SIZE_RECVD))?,
        };
        if n_dr != declared {
            debug!(declared, received = n_dr, "SZL record count adjusted");
        }
        Ok(Self {
            header: SzlHeader { length_dr, n_dr },
            data,
        })
    }

    /// Iterates over the records.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(usize::from(self.header.length_dr.max(1)))
    }

    /// Record whose leading index word equals `index`.
    fn record(&self, index: u16) -> Option<&[u8]> {
        self.records()
            .find(|record| record.len() >= 2 && u16::from_be_bytes([record[0], record[1]]) == index)
    }
}

/// Text stored in a fixed field, cut at the first NUL.
fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn be_u16(bytes: &[u8], offset: usize) -> Result<u16> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))
}

fn be_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))
}

/// CPU identification texts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuInfo {
    /// Module type, e.g. `CPU 315-2 PN/DP`.
    pub module_type_name: String,
    /// Serial number.
    pub serial_number: String,
    /// Name of the automation system.
    pub as_name: String,
    /// Copyright notice.
    pub copyright: String,
    /// Module name.
    pub module_name: String,
}

impl CpuInfo {
    fn from_szl(list: &SzlList) -> Result<Self> {
        let field = |index: u16, len: usize| -> Result<String> {
            let record = list
                .record(index)
                .ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER))?;
            Ok(text(&record[2..record.len().min(2 + len)]))
        };
        Ok(Self {
            as_name: field(1, 24)?,
            module_name: field(2, 24)?,
            copyright: field(4, 26)?,
            serial_number: field(5, 24)?,
            module_type_name: field(7, 32)?,
        })
    }
}

/// Order number and firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderCode {
    /// Order number, e.g. `6ES7 315-2EH14-0AB0 `.
    pub code: String,
    /// Firmware version (major, minor, patch).
    pub version: (u8, u8, u8),
}

impl OrderCode {
    fn from_szl(list: &SzlList) -> Result<Self> {
        let data = &list.data;
        if data.len() < 22 {
            return Err(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        }
        let n = data.len();
        Ok(Self {
            code: text(&data[2..22]),
            version: (data[n - 3], data[n - 2], data[n - 1]),
        })
    }
}

/// Communication processor limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpInfo {
    /// Largest PDU the CPU accepts.
    pub max_pdu_length: u16,
    /// Maximum number of connections.
    pub max_connections: u16,
    /// MPI rate in bit/s.
    pub max_mpi_rate: u32,
    /// Bus rate in bit/s.
    pub max_bus_rate: u32,
}

impl CpInfo {
    fn from_szl(list: &SzlList) -> Result<Self> {
        let data = &list.data;
        Ok(Self {
            max_pdu_length: be_u16(data, 2)?,
            max_connections: be_u16(data, 4)?,
            max_mpi_rate: be_u32(data, 6)?,
            max_bus_rate: be_u32(data, 10)?,
        })
    }
}

/// Protection level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Protection {
    /// Protection level set with the mode selector.
    pub sch_schal: u16,
    /// Password level set by parameter.
    pub sch_par: u16,
    /// Valid protection level of the CPU.
    pub sch_rel: u16,
    /// Mode selector position.
    pub bart_sch: u16,
    /// Startup switch position.
    pub anl_sch: u16,
}

impl Protection {
    fn from_szl(list: &SzlList) -> Result<Self> {
        let data = &list.data;
        Ok(Self {
            sch_schal: be_u16(data, 2)?,
            sch_par: be_u16(data, 4)?,
            sch_rel: be_u16(data, 6)?,
            bart_sch: be_u16(data, 8)?,
            anl_sch: be_u16(data, 10)?,
        })
    }
}

/// CPU operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CpuState {
    /// RUN.
    Run,
    /// STOP.
    Stop,
    /// Any other status byte.
    Unknown(u8),
}

impl CpuState {
    fn from_status(status: u8) -> Self {
        match status {
            0x08 => CpuState::Run,
            0x04 => CpuState::Stop,
            other => CpuState::Unknown(other),
        }
    }
}

/// Number of blocks of each type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub struct BlocksList {
    pub ob: u16,
    pub fb: u16,
    pub fc: u16,
    pub sfb: u16,
    pub sfc: u16,
    pub db: u16,
    pub sdb: u16,
}

impl BlocksList {
    fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() % 4 != 0 {
            return Err(S7Error::protocol(CLI_INVALID_DATA_SIZE_RECVD));
        }
        let mut list = Self::default();
        for entry in payload.chunks_exact(4) {
            let count = u16::from_be_bytes([entry[2], entry[3]]);
            match BlockType::from_code(entry[1]) {
                Some(BlockType::OB) => list.ob = count,
                Some(BlockType::FB) => list.fb = count,
                Some(BlockType::FC) => list.fc = count,
                Some(BlockType::SFB) => list.sfb = count,
                Some(BlockType::SFC) => list.sfc = count,
                Some(BlockType::DB) => list.db = count,
                Some(BlockType::SDB) => list.sdb = count,
                None => debug!(code = entry[1], "unknown block type in directory"),
            }
        }
        Ok(list)
    }

    /// Count for one block type.
    pub fn count(&self, block_type: BlockType) -> u16 {
        match block_type {
            BlockType::OB => self.ob,
            BlockType::FB => self.fb,
            BlockType::FC => self.fc,
            BlockType::SFB => self.sfb,
            BlockType::SFC => self.sfc,
            BlockType::DB => self.db,
            BlockType::SDB => self.sdb,
        }
    }
}

/// Header information of a program block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockInfo {
    /// Raw sub block type code (0x0A for a DB).
    pub block_type: u8,
    /// Block number.
    pub block_number: u16,
    /// Language code.
    pub block_lang: u8,
    /// Block flags.
    pub block_flags: u8,
    /// Size of the MC7 code (the data size for a DB).
    pub mc7_size: u16,
    /// Size in load memory.
    pub load_size: u32,
    /// Local data size.
    pub local_data: u16,
    /// SBB length.
    pub sbb_length: u16,
    /// Checksum.
    pub checksum: u16,
    /// Block version.
    pub version: u8,
    /// Date of the last code change.
    pub code_date: NaiveDate,
    /// Date of the last interface change.
    pub intf_date: NaiveDate,
    /// Author.
    pub author: String,
    /// Family.
    pub family: String,
    /// Header name.
    pub header: String,
}

/// Block dates count days from this day.
fn block_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1984, 1, 1).unwrap_or_default()
}

fn block_date(days: u16) -> NaiveDate {
    block_epoch() + chrono::Days::new(u64::from(days))
}

const PG_FOOTER_SIZE: usize = 36;
const PG_HEADER_SIZE: usize = 36;

impl BlockInfo {
    /// Block type, if the code is known.
    pub fn kind(&self) -> Option<BlockType> {
        BlockType::from_sub_block_code(self.block_type)
    }

    /// Parses the answer of the block info function.
    fn from_ag_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < 70 {
            return Err(S7Error::protocol(CLI_INVALID_DATA_SIZE_RECVD));
        }
        Ok(Self {
            block_type: payload[11],
            block_number: be_u16(payload, 12)?,
            block_lang: payload[10],
            block_flags: payload[9],
            mc7_size: be_u16(payload, 40)?,
            load_size: be_u32(payload, 14)?,
            local_data: be_u16(payload, 38)?,
            sbb_length: be_u16(payload, 34)?,
            checksum: be_u16(payload, 68)?,
            version: payload[66],
            code_date: block_date(be_u16(payload, 26)?),
            intf_date: block_date(be_u16(payload, 32)?),
            author: text(&payload[42..50]),
            family: text(&payload[50..58]),
            header: text(&payload[58..66]),
        })
    }

    /// Parses the header and footer of a block image as stored by a
    /// programming device.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the buffer cannot hold both header and
    /// footer.
    pub fn from_pg_block(block: &[u8]) -> Result<Self> {
        if block.len() < PG_HEADER_SIZE + PG_FOOTER_SIZE {
            return Err(S7Error::validation(
                CLI_INVALID_DATA_SIZE_RECVD,
                format!("block image of {} bytes is too short", block.len()),
            ));
        }
        let footer = &block[block.len() - PG_FOOTER_SIZE..];
        Ok(Self {
            block_type: block[5],
            block_number: be_u16(block, 6)?,
            block_lang: block[4],
            block_flags: block[3],
            mc7_size: be_u16(block, 34)?,
            load_size: be_u32(block, 8)?,
            local_data: be_u16(block, 32)?,
            sbb_length: be_u16(block, 28)?,
            checksum: 0,
            version: 0,
            code_date: block_date(be_u16(block, 20)?),
            intf_date: block_date(be_u16(block, 26)?),
            author: text(&footer[12..20]),
            family: text(&footer[20..28]),
            header: text(&footer[28..36]),
        })
    }
}

impl<T: Transport> Client<T> {
    /// Reads one SZL list, reassembling every fragment.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error if the CPU does not know `id`/`index` or the
    /// records do not add up.
    pub fn read_szl(&mut self, id: u16, index: u16) -> Result<SzlList> {
        self.with_session(|session| {
            let payload = session.user_data(&UserDataCommand::read_szl(id, index))?;
            SzlList::parse(&payload)
        })
    }

    /// Lists the SZL ids the CPU provides.
    pub fn read_szl_list(&mut self) -> Result<Vec<u16>> {
        let list = self.read_szl(SZL_ID_LIST, 0)?;
        Ok(list
            .data
            .chunks_exact(2)
            .map(|id| u16::from_be_bytes([id[0], id[1]]))
            .collect())
    }

    /// Reads the CPU identification texts.
    pub fn get_cpu_info(&mut self) -> Result<CpuInfo> {
        let list = self.read_szl(SZL_COMPONENT_ID, 0)?;
        self.record(CpuInfo::from_szl(&list))
    }

    /// Reads the order number and firmware version.
    pub fn get_order_code(&mut self) -> Result<OrderCode> {
        let list = self.read_szl(SZL_MODULE_ID, 0)?;
        self.record(OrderCode::from_szl(&list))
    }

    /// Reads the communication limits.
    pub fn get_cp_info(&mut self) -> Result<CpInfo> {
        let list = self.read_szl(SZL_COMM_CAPABILITIES, 0x0001)?;
        self.record(CpInfo::from_szl(&list))
    }

    /// Reads the protection level.
    pub fn get_protection(&mut self) -> Result<Protection> {
        let list = self.read_szl(SZL_PROTECTION, 0x0004)?;
        self.record(Protection::from_szl(&list))
    }

    /// Reads the operating mode.
    pub fn get_cpu_state(&mut self) -> Result<CpuState> {
        let list = self.read_szl(SZL_CPU_STATUS, 0)?;
        let status = list.data.get(3).copied();
        let status = status.ok_or(S7Error::protocol(CLI_INVALID_PLC_ANSWER));
        self.record(status).map(CpuState::from_status)
    }

    /// Counts the blocks of every type.
    pub fn list_blocks(&mut self) -> Result<BlocksList> {
        self.with_session(|session| {
            let payload = session.user_data(&UserDataCommand::list_blocks())?;
            BlocksList::parse(&payload)
        })
    }

    /// Lists the numbers of the blocks of one type, at most `max_count` of them.
    ///
    /// Asking for more blocks than exist is not an error; the available
    /// numbers are returned.
    pub fn list_blocks_of_type(&mut self, block_type: BlockType, max_count: usize) -> Result<Vec<u16>> {
        let entries = self.with_session(|session| block_directory(session, block_type))?;
        Ok(entries
            .chunks_exact(4)
            .take(max_count)
            .map(|entry| u16::from_be_bytes([entry[0], entry[1]]))
            .collect())
    }

    /// Reads the header information of a block stored in the CPU.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error if the block does not exist.
    pub fn get_block_info(&mut self, block_type: BlockType, number: u16) -> Result<BlockInfo> {
        self.with_session(|session| block_info(session, block_type, number))
    }

    /// Parses a block image previously uploaded to the programming device.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::{BlockType, Client, ClientConfig};
    ///
    /// let mut image = vec![0u8; 80];
    /// image[5] = 0x0A;
    /// image[7] = 5;
    /// let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
    /// let info = client.get_pg_block_info(&image).unwrap();
    /// assert_eq!(info.kind(), Some(BlockType::DB));
    /// assert_eq!(info.block_number, 5);
    /// ```
    pub fn get_pg_block_info(&mut self, block: &[u8]) -> Result<BlockInfo> {
        self.record(BlockInfo::from_pg_block(block))
    }
}

/// Directory entries of one block type, 4 bytes each with the block
/// number in the first two.
pub(crate) fn block_directory<T: Transport>(
    session: &mut Session<T>,
    block_type: BlockType,
) -> Result<Vec<u8>> {
    let payload = session.user_data(&UserDataCommand::list_blocks_of_type(block_type))?;
    if payload.len() % 4 != 0 {
        return Err(S7Error::protocol(CLI_INVALID_DATA_SIZE_RECVD));
    }
    Ok(payload)
}

pub(crate) fn block_info<T: Transport>(
    session: &mut Session<T>,
    block_type: BlockType,
    number: u16,
) -> Result<BlockInfo> {
    let payload = session.user_data(&UserDataCommand::block_info(block_type, number))?;
    BlockInfo::from_ag_payload(&payload)
}
