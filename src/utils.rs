//! Helpers for decoding and encoding S7 values inside raw buffers.
//!
//! S7 controllers store everything big-endian. These functions read and write
//! typed values at a byte offset of a buffer returned by (or about to be sent
//! to) the area functions of [`Client`](crate::Client).
//!
//! # Example
//!
//! ```
//! use s7_client::utils::{get_bool, get_int, get_real, set_int, set_real};
//!
//! let mut buffer = vec![0u8; 8];
//! set_int(&mut buffer, 0, -1234).unwrap();
//! set_real(&mut buffer, 2, 3.5).unwrap();
//! buffer[6] = 0b0000_0100;
//!
//! assert_eq!(get_int(&buffer, 0).unwrap(), -1234);
//! assert_eq!(get_real(&buffer, 2).unwrap(), 3.5);
//! assert!(get_bool(&buffer, 6, 2).unwrap());
//! ```

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Result, S7Error};
use crate::status::{CLI_BUFFER_TOO_SMALL, CLI_INVALID_VALUE};

fn field(buffer: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buffer.get(offset..end))
        .ok_or_else(|| out_of_bounds(buffer.len(), offset, len))
}

fn field_mut(buffer: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8]> {
    let available = buffer.len();
    offset
        .checked_add(len)
        .and_then(|end| buffer.get_mut(offset..end))
        .ok_or_else(|| out_of_bounds(available, offset, len))
}

fn out_of_bounds(available: usize, offset: usize, len: usize) -> S7Error {
    S7Error::validation(
        CLI_BUFFER_TOO_SMALL,
        format!("{len} bytes at offset {offset} exceed buffer of {available}"),
    )
}

fn array<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(field(buffer, offset, N)?);
    Ok(bytes)
}

/// Reads bit `bit` (0-7) of the byte at `offset`.
///
/// # Example
///
/// ```
/// use s7_client::utils::get_bool;
///
/// assert!(get_bool(&[0b0000_0101], 0, 2).unwrap());
/// assert!(!get_bool(&[0b0000_0101], 0, 1).unwrap());
/// ```
pub fn get_bool(buffer: &[u8], offset: usize, bit: u8) -> Result<bool> {
    check_bit(bit)?;
    Ok(field(buffer, offset, 1)?[0] & (1 << bit) != 0)
}

/// Sets or clears bit `bit` (0-7) of the byte at `offset`.
pub fn set_bool(buffer: &mut [u8], offset: usize, bit: u8, value: bool) -> Result<()> {
    check_bit(bit)?;
    let byte = &mut field_mut(buffer, offset, 1)?[0];
    if value {
        *byte |= 1 << bit;
    } else {
        *byte &= !(1 << bit);
    }
    Ok(())
}

fn check_bit(bit: u8) -> Result<()> {
    if bit > 7 {
        return Err(S7Error::validation(CLI_INVALID_VALUE, format!("bit {bit} out of range 0-7")));
    }
    Ok(())
}

/// Reads a signed 16-bit INT.
pub fn get_int(buffer: &[u8], offset: usize) -> Result<i16> {
    Ok(i16::from_be_bytes(array(buffer, offset)?))
}

/// Writes a signed 16-bit INT.
pub fn set_int(buffer: &mut [u8], offset: usize, value: i16) -> Result<()> {
    field_mut(buffer, offset, 2)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads a signed 32-bit DINT.
pub fn get_dint(buffer: &[u8], offset: usize) -> Result<i32> {
    Ok(i32::from_be_bytes(array(buffer, offset)?))
}

/// Writes a signed 32-bit DINT.
pub fn set_dint(buffer: &mut [u8], offset: usize, value: i32) -> Result<()> {
    field_mut(buffer, offset, 4)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads an unsigned 16-bit WORD.
pub fn get_word(buffer: &[u8], offset: usize) -> Result<u16> {
    Ok(u16::from_be_bytes(array(buffer, offset)?))
}

/// Writes an unsigned 16-bit WORD.
pub fn set_word(buffer: &mut [u8], offset: usize, value: u16) -> Result<()> {
    field_mut(buffer, offset, 2)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads an unsigned 32-bit DWORD.
pub fn get_dword(buffer: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_be_bytes(array(buffer, offset)?))
}

/// Writes an unsigned 32-bit DWORD.
pub fn set_dword(buffer: &mut [u8], offset: usize, value: u32) -> Result<()> {
    field_mut(buffer, offset, 4)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads an IEEE 754 REAL.
pub fn get_real(buffer: &[u8], offset: usize) -> Result<f32> {
    Ok(f32::from_be_bytes(array(buffer, offset)?))
}

/// Writes an IEEE 754 REAL.
pub fn set_real(buffer: &mut [u8], offset: usize, value: f32) -> Result<()> {
    field_mut(buffer, offset, 4)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Reads an S7 STRING: max length byte, actual length byte, then the characters.
///
/// # Example
///
/// ```
/// use s7_client::utils::get_string;
///
/// let buffer = [10, 5, b'h', b'e', b'l', b'l', b'o', 0, 0, 0, 0, 0];
/// assert_eq!(get_string(&buffer, 0).unwrap(), "hello");
/// ```
pub fn get_string(buffer: &[u8], offset: usize) -> Result<String> {
    let [max_len, len] = array::<2>(buffer, offset)?;
    if len > max_len {
        return Err(S7Error::validation(
            CLI_INVALID_VALUE,
            format!("string length {len} exceeds its maximum {max_len}"),
        ));
    }
    let chars = field(buffer, offset + 2, usize::from(len))?;
    Ok(chars.iter().map(|&c| char::from(c)).collect())
}

/// Writes an S7 STRING with room for `max_len` characters.
///
/// The unused tail of the string area is filled with spaces.
///
/// # Errors
///
/// Returns a `Validation` error if `value` is longer than `max_len`, is not
/// ASCII, or the buffer cannot hold `max_len + 2` bytes at `offset`.
pub fn set_string(buffer: &mut [u8], offset: usize, value: &str, max_len: u8) -> Result<()> {
    if !value.is_ascii() || value.len() > usize::from(max_len) {
        return Err(S7Error::validation(
            CLI_INVALID_VALUE,
            format!("string does not fit in {max_len} ASCII characters"),
        ));
    }
    let target = field_mut(buffer, offset, usize::from(max_len) + 2)?;
    target[0] = max_len;
    target[1] = value.len() as u8;
    target[2..].fill(b' ');
    target[2..2 + value.len()].copy_from_slice(value.as_bytes());
    Ok(())
}

/// Converts a BCD byte to its value.
///
/// ```
/// assert_eq!(s7_client::utils::bcd_to_byte(0x59), 59);
/// ```
pub fn bcd_to_byte(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Converts a value below 100 to BCD.
///
/// ```
/// assert_eq!(s7_client::utils::byte_to_bcd(59), 0x59);
/// ```
pub fn byte_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Reads an 8 byte S7 DATE_AND_TIME.
///
/// Years 90-99 map to 1990-1999, everything else to 20xx.
///
/// # Example
///
/// ```
/// use s7_client::utils::get_dt;
///
/// let buffer = [0x24, 0x03, 0x15, 0x10, 0x30, 0x45, 0x12, 0x36];
/// let dt = get_dt(&buffer, 0).unwrap();
/// assert_eq!(dt.to_string(), "2024-03-15 10:30:45.123");
/// ```
pub fn get_dt(buffer: &[u8], offset: usize) -> Result<NaiveDateTime> {
    let raw: [u8; 8] = array(buffer, offset)?;
    let year = i32::from(bcd_to_byte(raw[0]));
    let year = if year >= 90 { 1900 + year } else { 2000 + year };
    let millis = u32::from(bcd_to_byte(raw[6])) * 10 + u32::from(raw[7] >> 4);
    NaiveDate::from_ymd_opt(year, u32::from(bcd_to_byte(raw[1])), u32::from(bcd_to_byte(raw[2])))
        .and_then(|date| {
            date.and_hms_milli_opt(
                u32::from(bcd_to_byte(raw[3])),
                u32::from(bcd_to_byte(raw[4])),
                u32::from(bcd_to_byte(raw[5])),
                millis,
            )
        })
        .ok_or_else(|| S7Error::validation(CLI_INVALID_VALUE, format!("invalid DATE_AND_TIME {raw:02X?}")))
}

/// Writes an 8 byte S7 DATE_AND_TIME (weekday 1 = Sunday).
///
/// # Errors
///
/// Returns a `Validation` error for years outside 1990-2089.
pub fn set_dt(buffer: &mut [u8], offset: usize, datetime: NaiveDateTime) -> Result<()> {
    let year = datetime.year();
    if !(1990..=2089).contains(&year) {
        return Err(S7Error::validation(
            CLI_INVALID_VALUE,
            format!("year {year} cannot be encoded"),
        ));
    }
    let millis = (datetime.nanosecond() / 1_000_000).min(999);
    let weekday = datetime.weekday().number_from_sunday() as u8;
    let target = field_mut(buffer, offset, 8)?;
    target[0] = byte_to_bcd((year % 100) as u8);
    target[1] = byte_to_bcd(datetime.month() as u8);
    target[2] = byte_to_bcd(datetime.day() as u8);
    target[3] = byte_to_bcd(datetime.hour() as u8);
    target[4] = byte_to_bcd(datetime.minute() as u8);
    target[5] = byte_to_bcd(datetime.second().min(59) as u8);
    target[6] = byte_to_bcd((millis / 10) as u8);
    target[7] = (((millis % 10) as u8) << 4) | weekday;
    Ok(())
}
