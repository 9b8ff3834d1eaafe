//! Example: Writing data to PLC memory
//!
//! Run with: cargo run --example simple_write
//!
//! This example demonstrates:
//! - Writing bytes to data blocks and merkers
//! - Writing single bits and typed values
//! - Filling a whole data block
//! - Writing several variables in one exchange
//! - Running a write in the background

use std::time::Duration;

use s7_client::utils::{set_int, set_real, set_string};
use s7_client::{Area, Client, ClientConfig, DataItem, MemoryAddress, S7Error};

fn main() -> s7_client::Result<()> {
    // =========================================================================
    // Connect to PLC
    // =========================================================================

    let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
    client.connect()?;

    // =========================================================================
    // Writing Bytes
    // =========================================================================

    println!("=== Writing Bytes ===\n");

    client.db_write(1, 0, &[0x01, 0x02, 0x03, 0x04])?;
    println!("Wrote 01 02 03 04 to DB1.DBB0");

    client.mb_write(20, &[0xFF])?;
    println!("Wrote FF to MB20");

    // The buffer must match amount × element size
    match client.ct_write(0, 2, &[0x00]) {
        Err(S7Error::Validation { reason, .. }) => println!("Rejected locally: {reason}"),
        other => println!("Unexpected: {other:?}"),
    }

    // =========================================================================
    // Bits and Typed Values
    // =========================================================================

    println!("\n=== Bits and Typed Values ===\n");

    client.write_area(MemoryAddress::bit(Area::Merkers, 0, 10, 3)?, &[1])?;
    println!("Set M10.3");

    let mut record = vec![0u8; 34];
    set_int(&mut record, 0, -1234)?;
    set_real(&mut record, 6, 21.5)?;
    set_string(&mut record, 12, "S7 client", 20)?;
    client.db_write(10, 0, &record)?;
    println!("Wrote INT, REAL and STRING to DB10");

    // =========================================================================
    // Fill
    // =========================================================================

    println!("\n=== Fill ===\n");

    client.db_fill(2, 0x00)?;
    println!("Cleared DB2");

    // =========================================================================
    // Multiple Write (Single Request)
    // =========================================================================

    println!("\n=== Multiple Write ===\n");

    let results = client.write_multi_vars(&[
        DataItem::new(MemoryAddress::db(1, 10, 2), vec![0x12, 0x34]),
        DataItem::new(MemoryAddress::new(Area::Merkers, 0, 30, 1), vec![0x55]),
        DataItem::new(MemoryAddress::new(Area::Timers, 0, 0, 1), vec![0x10, 0x05]),
    ])?;
    println!("All items written: {}", results.all_ok());

    // =========================================================================
    // Background Write
    // =========================================================================

    println!("\n=== Background Write ===\n");

    let job = client.as_db_write(1, 100, &[0xAA; 8])?;
    // other work may happen here
    client.wait(&job, Duration::from_secs(2))?;
    println!("Job {} finished: {:?}", job.id(), client.poll(&job));

    client.disconnect();
    println!("\nWrite example completed!");
    Ok(())
}
