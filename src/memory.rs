//! Memory area, word length and address definitions.
//!
//! This module defines the [`Area`] and [`WordLen`] enums and the
//! [`MemoryAddress`] that combines them with a block number, an offset and
//! an element count.
//!
//! # Memory Areas Overview
//!
//! | Area | Description | Default word length | Block number |
//! |------|-------------|---------------------|:------------:|
//! | PE | Process inputs | Byte | ✗ |
//! | PA | Process outputs | Byte | ✗ |
//! | MK | Merkers (flags) | Byte | ✗ |
//! | DB | Data block | Byte | ✓ |
//! | CT | Counters | Counter (fixed) | ✗ |
//! | TM | Timers | Timer (fixed) | ✗ |
//!
//! # Example
//!
//! ```
//! use s7_client::{Area, MemoryAddress, WordLen};
//!
//! let address = MemoryAddress::db(1, 0, 4);
//! assert_eq!(address.byte_len(), 4);
//!
//! let timers = MemoryAddress::new(Area::Timers, 0, 0, 3);
//! assert_eq!(timers.word_len(), WordLen::Timer);
//! assert_eq!(timers.byte_len(), 6);
//! ```

use std::str::FromStr;

use crate::error::{Result, S7Error};
use crate::status::{
    CLI_ADDRESS_OUT_OF_RANGE, CLI_INVALID_BLOCK_TYPE, CLI_INVALID_PARAMS, CLI_INVALID_WORD_LEN,
};

/// Highest bit address the 24 bit address field of a request can carry.
pub const MAX_BIT_ADDRESS: u32 = 0x00FF_FFFF;

/// Memory areas of an S7 controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Area {
    /// Process inputs (PE / I).
    ProcessInputs,
    /// Process outputs (PA / Q).
    ProcessOutputs,
    /// Merkers / flags (MK / M).
    Merkers,
    /// Data block (DB).
    DataBlock,
    /// Counters (CT / C).
    Counters,
    /// Timers (TM / T).
    Timers,
}

impl Area {
    /// Returns the S7 protocol code of this area.
    pub(crate) fn code(self) -> u8 {
        match self {
            Area::ProcessInputs => 0x81,
            Area::ProcessOutputs => 0x82,
            Area::Merkers => 0x83,
            Area::DataBlock => 0x84,
            Area::Counters => 0x1C,
            Area::Timers => 0x1D,
        }
    }

    /// Parses an S7 protocol area code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x81 => Some(Area::ProcessInputs),
            0x82 => Some(Area::ProcessOutputs),
            0x83 => Some(Area::Merkers),
            0x84 => Some(Area::DataBlock),
            0x1C => Some(Area::Counters),
            0x1D => Some(Area::Timers),
            _ => None,
        }
    }

    /// Word length used when none is given explicitly.
    pub fn default_word_len(self) -> WordLen {
        match self {
            Area::Counters => WordLen::Counter,
            Area::Timers => WordLen::Timer,
            _ => WordLen::Byte,
        }
    }

    /// Returns whether `word_len` may be used to address this area.
    ///
    /// Counters and timers only accept their own fixed word length, and
    /// the counter/timer word lengths are rejected everywhere else.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::{Area, WordLen};
    ///
    /// assert!(Area::Timers.accepts(WordLen::Timer));
    /// assert!(!Area::Timers.accepts(WordLen::Byte));
    /// assert!(!Area::DataBlock.accepts(WordLen::Counter));
    /// ```
    pub fn accepts(self, word_len: WordLen) -> bool {
        match self {
            Area::Counters => word_len == WordLen::Counter,
            Area::Timers => word_len == WordLen::Timer,
            _ => !matches!(word_len, WordLen::Counter | WordLen::Timer),
        }
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Area::ProcessInputs => write!(f, "PE"),
            Area::ProcessOutputs => write!(f, "PA"),
            Area::Merkers => write!(f, "MK"),
            Area::DataBlock => write!(f, "DB"),
            Area::Counters => write!(f, "CT"),
            Area::Timers => write!(f, "TM"),
        }
    }
}

/// Width of one addressable element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordLen {
    /// Single bit; the offset is expressed in bits.
    Bit,
    /// 8-bit byte.
    Byte,
    /// 8-bit character.
    Char,
    /// 16-bit unsigned word.
    Word,
    /// 16-bit signed integer.
    Int,
    /// 32-bit unsigned double word.
    DWord,
    /// 32-bit signed integer.
    DInt,
    /// 32-bit IEEE float.
    Real,
    /// Counter value (counter area only).
    Counter,
    /// Timer value (timer area only).
    Timer,
}

impl WordLen {
    /// Size in bytes of one element.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::WordLen;
    ///
    /// assert_eq!(WordLen::Bit.size(), 1);
    /// assert_eq!(WordLen::Int.size(), 2);
    /// assert_eq!(WordLen::Real.size(), 4);
    /// assert_eq!(WordLen::Timer.size(), 2);
    /// ```
    pub fn size(self) -> usize {
        match self {
            WordLen::Bit | WordLen::Byte | WordLen::Char => 1,
            WordLen::Word | WordLen::Int | WordLen::Counter | WordLen::Timer => 2,
            WordLen::DWord | WordLen::DInt | WordLen::Real => 4,
        }
    }

    /// Returns the S7 protocol code of this word length.
    pub(crate) fn code(self) -> u8 {
        match self {
            WordLen::Bit => 0x01,
            WordLen::Byte => 0x02,
            WordLen::Char => 0x03,
            WordLen::Word => 0x04,
            WordLen::Int => 0x05,
            WordLen::DWord => 0x06,
            WordLen::DInt => 0x07,
            WordLen::Real => 0x08,
            WordLen::Counter => 0x1C,
            WordLen::Timer => 0x1D,
        }
    }

    /// Parses an S7 protocol word length code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(WordLen::Bit),
            0x02 => Some(WordLen::Byte),
            0x03 => Some(WordLen::Char),
            0x04 => Some(WordLen::Word),
            0x05 => Some(WordLen::Int),
            0x06 => Some(WordLen::DWord),
            0x07 => Some(WordLen::DInt),
            0x08 => Some(WordLen::Real),
            0x1C => Some(WordLen::Counter),
            0x1D => Some(WordLen::Timer),
            _ => None,
        }
    }

    /// Transport size used in the data section of a write request.
    pub(crate) fn transport_size(self) -> TransportSize {
        match self {
            WordLen::Bit => TransportSize::Bit,
            WordLen::Int | WordLen::DInt => TransportSize::Int,
            WordLen::Real => TransportSize::Real,
            WordLen::Char | WordLen::Counter | WordLen::Timer => TransportSize::Octet,
            WordLen::Byte | WordLen::Word | WordLen::DWord => TransportSize::Byte,
        }
    }
}

/// Transport size of a data item; decides whether its length counts bits or bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportSize {
    Bit,
    Byte,
    Int,
    Real,
    Octet,
}

impl TransportSize {
    pub(crate) fn code(self) -> u8 {
        match self {
            TransportSize::Bit => 0x03,
            TransportSize::Byte => 0x04,
            TransportSize::Int => 0x05,
            TransportSize::Real => 0x07,
            TransportSize::Octet => 0x09,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0x03 => Some(TransportSize::Bit),
            0x04 => Some(TransportSize::Byte),
            0x05 => Some(TransportSize::Int),
            0x07 => Some(TransportSize::Real),
            0x09 => Some(TransportSize::Octet),
            _ => None,
        }
    }

    /// Converts a byte count into the length field written on the wire.
    pub(crate) fn encode_len(self, bytes: usize) -> u16 {
        match self {
            TransportSize::Bit => bytes as u16,
            TransportSize::Byte | TransportSize::Int => (bytes * 8) as u16,
            TransportSize::Real | TransportSize::Octet => bytes as u16,
        }
    }

    /// Converts the length field read from the wire into a byte count.
    pub(crate) fn decode_len(self, len: u16) -> usize {
        match self {
            TransportSize::Bit => len as usize,
            TransportSize::Byte | TransportSize::Int => (len as usize).div_ceil(8),
            TransportSize::Real | TransportSize::Octet => len as usize,
        }
    }
}

/// A contiguous run of elements in one memory area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryAddress {
    area: Area,
    db_number: u16,
    start: u32,
    amount: u16,
    word_len: WordLen,
}

impl MemoryAddress {
    /// Creates an address using the area's default word length.
    ///
    /// `db_number` is only meaningful for [`Area::DataBlock`] and is stored
    /// as 0 for every other area.
    pub fn new(area: Area, db_number: u16, start: u32, amount: u16) -> Self {
        Self {
            area,
            db_number: if area == Area::DataBlock { db_number } else { 0 },
            start,
            amount,
            word_len: area.default_word_len(),
        }
    }

    /// Creates a byte address inside a data block.
    pub fn db(db_number: u16, start: u32, amount: u16) -> Self {
        Self::new(Area::DataBlock, db_number, start, amount)
    }

    /// Creates an address for a single bit; `start` is `byte * 8 + bit`.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if `bit` is above 7 or the bit address
    /// does not fit in 24 bits.
    pub fn bit(area: Area, db_number: u16, byte: u32, bit: u8) -> Result<Self> {
        if bit > 7 {
            return Err(S7Error::validation(CLI_INVALID_PARAMS, "bit must be 0-7"));
        }
        let start = byte
            .checked_mul(8)
            .and_then(|bits| bits.checked_add(u32::from(bit)))
            .filter(|&bits| bits <= MAX_BIT_ADDRESS)
            .ok_or_else(|| {
                S7Error::validation(
                    CLI_ADDRESS_OUT_OF_RANGE,
                    format!("bit {byte}.{bit} is beyond the addressable range"),
                )
            })?;
        Self::new(area, db_number, start, 1).with_word_len(WordLen::Bit)
    }

    /// Replaces the word length.
    ///
    /// Bit access always transfers a single element, so [`WordLen::Bit`]
    /// sets the amount to 1.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the area does not accept the word
    /// length (see [`Area::accepts`]).
    pub fn with_word_len(mut self, word_len: WordLen) -> Result<Self> {
        if !self.area.accepts(word_len) {
            return Err(S7Error::validation(
                CLI_INVALID_WORD_LEN,
                format!("{} area does not accept {:?} elements", self.area, word_len),
            ));
        }
        self.word_len = word_len;
        if word_len == WordLen::Bit {
            self.amount = 1;
        }
        Ok(self)
    }

    /// Memory area.
    pub fn area(&self) -> Area {
        self.area
    }

    /// Data block number (0 outside the DB area).
    pub fn db_number(&self) -> u16 {
        self.db_number
    }

    /// Start offset in elements (bits for [`WordLen::Bit`]).
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Number of elements.
    pub fn amount(&self) -> u16 {
        self.amount
    }

    /// Element word length.
    pub fn word_len(&self) -> WordLen {
        self.word_len
    }

    /// Number of bytes exchanged for this address (`amount × word size`).
    pub fn byte_len(&self) -> usize {
        usize::from(self.amount) * self.word_len.size()
    }

    /// Checks the address before any request is built.
    ///
    /// Every element, including the last one of a large transfer, must have
    /// a bit address that fits in the 24 bit address field.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(S7Error::validation(
                CLI_INVALID_PARAMS,
                "amount must be greater than 0",
            ));
        }
        if !self.area.accepts(self.word_len) {
            return Err(S7Error::validation(
                CLI_INVALID_WORD_LEN,
                format!("{} area does not accept {:?} elements", self.area, self.word_len),
            ));
        }
        // reachable only through deserialization; the builders force 1
        if self.word_len == WordLen::Bit && self.amount != 1 {
            return Err(S7Error::validation(
                CLI_INVALID_PARAMS,
                "bit access transfers exactly one element",
            ));
        }
        let last = self
            .stride(self.amount - 1)
            .and_then(|offset| self.start.checked_add(offset))
            .and_then(|start| self.bit_address(start));
        if last.is_none() {
            return Err(S7Error::validation(
                CLI_ADDRESS_OUT_OF_RANGE,
                format!(
                    "{} x {:?} at {} exceeds the 24 bit address range",
                    self.amount, self.word_len, self.start
                ),
            ));
        }
        Ok(())
    }

    /// Start offset advance for `elements` elements.
    fn stride(&self, elements: u16) -> Option<u32> {
        match self.word_len {
            WordLen::Bit | WordLen::Counter | WordLen::Timer => Some(u32::from(elements)),
            other => u32::from(elements).checked_mul(other.size() as u32),
        }
    }

    /// Wire address of an element starting at `start`, if it fits in 24 bits.
    fn bit_address(&self, start: u32) -> Option<u32> {
        let address = match self.word_len {
            WordLen::Bit | WordLen::Counter | WordLen::Timer => Some(start),
            _ => start.checked_mul(8),
        }?;
        (address <= MAX_BIT_ADDRESS).then_some(address)
    }

    /// Bit address written into the request (24 bits on the wire).
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error with `CLI_ADDRESS_OUT_OF_RANGE` if the
    /// address does not fit.
    pub(crate) fn wire_address(&self) -> Result<u32> {
        self.bit_address(self.start).ok_or_else(|| {
            S7Error::validation(
                CLI_ADDRESS_OUT_OF_RANGE,
                format!("start {} exceeds the 24 bit address range", self.start),
            )
        })
    }

    /// Returns the same address shifted by `elements` and limited to `amount` elements.
    pub(crate) fn slice(&self, elements: u16, amount: u16) -> Result<Self> {
        let start = self
            .stride(elements)
            .and_then(|step| self.start.checked_add(step))
            .ok_or_else(|| {
                S7Error::validation(
                    CLI_ADDRESS_OUT_OF_RANGE,
                    format!("element {elements} after {} is not addressable", self.start),
                )
            })?;
        Ok(Self {
            start,
            amount,
            ..*self
        })
    }
}

/// Block types stored in a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockType {
    /// Organization block.
    OB,
    /// Data block.
    DB,
    /// System data block.
    SDB,
    /// Function.
    FC,
    /// System function.
    SFC,
    /// Function block.
    FB,
    /// System function block.
    SFB,
}

impl BlockType {
    /// All block types, in the order used by block listings.
    pub const ALL: [BlockType; 7] = [
        BlockType::OB,
        BlockType::FB,
        BlockType::FC,
        BlockType::SFB,
        BlockType::SFC,
        BlockType::DB,
        BlockType::SDB,
    ];

    /// Returns the S7 protocol code of this block type.
    pub(crate) fn code(self) -> u8 {
        match self {
            BlockType::OB => 0x38,
            BlockType::DB => 0x41,
            BlockType::SDB => 0x42,
            BlockType::FC => 0x43,
            BlockType::SFC => 0x44,
            BlockType::FB => 0x45,
            BlockType::SFB => 0x46,
        }
    }

    /// Parses an S7 protocol block type code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x38 => Some(BlockType::OB),
            0x41 => Some(BlockType::DB),
            0x42 => Some(BlockType::SDB),
            0x43 => Some(BlockType::FC),
            0x44 => Some(BlockType::SFC),
            0x45 => Some(BlockType::FB),
            0x46 => Some(BlockType::SFB),
            _ => None,
        }
    }

    /// Parses the sub block type stored in a block image header.
    pub(crate) fn from_sub_block_code(code: u8) -> Option<Self> {
        match code {
            0x08 => Some(BlockType::OB),
            0x0A => Some(BlockType::DB),
            0x0B => Some(BlockType::SDB),
            0x0C => Some(BlockType::FC),
            0x0D => Some(BlockType::SFC),
            0x0E => Some(BlockType::FB),
            0x0F => Some(BlockType::SFB),
            _ => None,
        }
    }
}

impl FromStr for BlockType {
    type Err = S7Error;

    /// Parses a block type name such as `"DB"` (case insensitive).
    ///
    /// # Example
    ///
    /// ```
    /// use s7_client::BlockType;
    ///
    /// assert_eq!("db".parse::<BlockType>().unwrap(), BlockType::DB);
    /// assert!("NOblocktype".parse::<BlockType>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OB" => Ok(BlockType::OB),
            "DB" => Ok(BlockType::DB),
            "SDB" => Ok(BlockType::SDB),
            "FC" => Ok(BlockType::FC),
            "SFC" => Ok(BlockType::SFC),
            "FB" => Ok(BlockType::FB),
            "SFB" => Ok(BlockType::SFB),
            _ => Err(S7Error::validation(
                CLI_INVALID_BLOCK_TYPE,
                format!("unknown block type '{s}'"),
            )),
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockType::OB => "OB",
            BlockType::DB => "DB",
            BlockType::SDB => "SDB",
            BlockType::FC => "FC",
            BlockType::SFC => "SFC",
            BlockType::FB => "FB",
            BlockType::SFB => "SFB",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_codes() {
        assert_eq!(Area::ProcessInputs.code(), 0x81);
        assert_eq!(Area::ProcessOutputs.code(), 0x82);
        assert_eq!(Area::Merkers.code(), 0x83);
        assert_eq!(Area::DataBlock.code(), 0x84);
        assert_eq!(Area::Counters.code(), 0x1C);
        assert_eq!(Area::Timers.code(), 0x1D);
        assert_eq!(Area::from_code(0x84), Some(Area::DataBlock));
        assert_eq!(Area::from_code(0x00), None);
    }

    #[test]
    fn test_counter_and_timer_are_fixed() {
        assert!(MemoryAddress::new(Area::Counters, 0, 0, 1)
            .with_word_len(WordLen::Byte)
            .is_err());
        assert!(MemoryAddress::new(Area::Merkers, 0, 0, 1)
            .with_word_len(WordLen::Timer)
            .is_err());
        assert!(MemoryAddress::new(Area::Merkers, 0, 0, 1)
            .with_word_len(WordLen::Real)
            .is_ok());
    }

    #[test]
    fn test_db_number_ignored_outside_db() {
        let address = MemoryAddress::new(Area::Merkers, 7, 10, 2);
        assert_eq!(address.db_number(), 0);
        assert_eq!(MemoryAddress::db(7, 10, 2).db_number(), 7);
    }

    #[test]
    fn test_byte_len() {
        let address = MemoryAddress::db(1, 0, 3).with_word_len(WordLen::DInt).unwrap();
        assert_eq!(address.byte_len(), 12);
        assert_eq!(MemoryAddress::new(Area::Counters, 0, 0, 5).byte_len(), 10);
    }

    #[test]
    fn test_validate() {
        assert!(MemoryAddress::db(1, 0, 0).validate().is_err());
        let bit = MemoryAddress::bit(Area::DataBlock, 1, 4, 3).unwrap();
        assert_eq!(bit.start(), 35);
        assert!(bit.validate().is_ok());
        assert!(MemoryAddress::bit(Area::DataBlock, 1, 4, 8).is_err());
    }

    #[test]
    fn test_wire_address_and_slice() {
        let address = MemoryAddress::db(1, 10, 100);
        assert_eq!(address.wire_address().unwrap(), 80);
        let next = address.slice(40, 60).unwrap();
        assert_eq!(next.start(), 50);
        assert_eq!(next.amount(), 60);

        let words = MemoryAddress::db(1, 0, 10).with_word_len(WordLen::Word).unwrap();
        assert_eq!(words.slice(4, 6).unwrap().start(), 8);

        let timers = MemoryAddress::new(Area::Timers, 0, 3, 10);
        assert_eq!(timers.wire_address().unwrap(), 3);
        assert_eq!(timers.slice(4, 6).unwrap().start(), 7);
    }

    #[test]
    fn test_byte_offset_limited_to_24_bit_address() {
        let last = MemoryAddress::db(1, 0x1F_FFFF, 1);
        assert!(last.validate().is_ok());
        assert_eq!(last.wire_address().unwrap(), 0xFF_FFF8);

        for start in [0x20_0000, 0x2000_0000, u32::MAX] {
            let address = MemoryAddress::db(1, start, 1);
            assert_eq!(address.validate().unwrap_err().code(), CLI_ADDRESS_OUT_OF_RANGE);
            assert!(address.wire_address().is_err());
        }
    }

    #[test]
    fn test_last_element_must_be_addressable() {
        // first element fits, the fourth one does not
        let dwords = MemoryAddress::db(1, 0x1F_FFF8, 4).with_word_len(WordLen::DWord).unwrap();
        assert!(dwords.validate().is_err());
        let dwords = MemoryAddress::db(1, 0x1F_FFF0, 4).with_word_len(WordLen::DWord).unwrap();
        assert!(dwords.validate().is_ok());

        let counters = MemoryAddress::new(Area::Counters, 0, MAX_BIT_ADDRESS, 1);
        assert!(counters.validate().is_ok());
        assert!(MemoryAddress::new(Area::Counters, 0, MAX_BIT_ADDRESS, 2).validate().is_err());
        assert!(MemoryAddress::db(1, u32::MAX, 2).slice(1, 1).is_err());
    }

    #[test]
    fn test_bit_address_limits() {
        let highest = MemoryAddress::bit(Area::Merkers, 0, 0x1F_FFFF, 7).unwrap();
        assert_eq!(highest.start(), MAX_BIT_ADDRESS);
        assert_eq!(highest.wire_address().unwrap(), MAX_BIT_ADDRESS);

        let err = MemoryAddress::bit(Area::Merkers, 0, 0x20_0000, 0).unwrap_err();
        assert_eq!(err.code(), CLI_ADDRESS_OUT_OF_RANGE);
        assert!(MemoryAddress::bit(Area::Merkers, 0, u32::MAX, 7).is_err());
    }

    #[test]
    fn test_bit_access_forces_single_element() {
        let bits = MemoryAddress::db(1, 35, 4).with_word_len(WordLen::Bit).unwrap();
        assert_eq!(bits.amount(), 1);
        assert_eq!(bits.byte_len(), 1);
        assert!(bits.validate().is_ok());

        let decoded = MemoryAddress { amount: 4, ..bits };
        assert_eq!(decoded.validate().unwrap_err().code(), CLI_INVALID_PARAMS);
    }

    #[test]
    fn test_transport_sizes() {
        assert_eq!(WordLen::Bit.transport_size(), TransportSize::Bit);
        assert_eq!(WordLen::Int.transport_size(), TransportSize::Int);
        assert_eq!(WordLen::Timer.transport_size(), TransportSize::Octet);
        assert_eq!(TransportSize::Byte.encode_len(4), 32);
        assert_eq!(TransportSize::Byte.decode_len(32), 4);
        assert_eq!(TransportSize::Octet.decode_len(4), 4);
    }

    #[test]
    fn test_block_type_parse() {
        assert_eq!("FB".parse::<BlockType>().unwrap(), BlockType::FB);
        let err = "NOblocktype".parse::<BlockType>().unwrap_err();
        assert_eq!(err.code(), CLI_INVALID_BLOCK_TYPE);
        assert_eq!(BlockType::from_code(BlockType::SDB.code()), Some(BlockType::SDB));
        assert_eq!(BlockType::DB.to_string(), "DB");
    }
}
