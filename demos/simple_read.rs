//! Example: Reading data from PLC memory
//!
//! Run with: cargo run --example simple_read
//!
//! This example demonstrates:
//! - Reading bytes from data blocks, merkers and process images
//! - Reading single bits, timers and counters
//! - Decoding S7 types with the `utils` helpers
//! - Reading several variables in one exchange

use s7_client::utils::{get_bool, get_dint, get_int, get_real, get_string};
use s7_client::{Area, Client, ClientConfig, MemoryAddress, WordLen};

fn main() -> s7_client::Result<()> {
    // =========================================================================
    // Connect to PLC
    // =========================================================================

    // S7-300: rack 0, slot 2. S7-1200/1500: rack 0, slot 1.
    let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
    client.connect()?;
    println!("Connected, PDU length {}", client.get_pdu_length());

    // =========================================================================
    // Reading Bytes
    // =========================================================================

    println!("\n=== Reading Bytes ===\n");

    let db = client.db_read(1, 0, 16)?;
    println!("DB1.DBB0-15: {:02X?}", db);

    let inputs = client.eb_read(0, 2)?;
    let outputs = client.ab_read(0, 2)?;
    let flags = client.mb_read(0, 4)?;
    println!("IB0-1 = {:02X?}", inputs);
    println!("QB0-1 = {:02X?}", outputs);
    println!("MB0-3 = {:02X?}", flags);

    // Large reads are split into PDU sized exchanges
    let big = client.db_read(1, 0, 1024)?;
    println!("Read {} bytes from DB1", big.len());

    // =========================================================================
    // Bits, Timers and Counters
    // =========================================================================

    println!("\n=== Bits, Timers and Counters ===\n");

    let m10_3 = client.read_area(MemoryAddress::bit(Area::Merkers, 0, 10, 3)?)?;
    println!("M10.3 = {}", m10_3[0] == 1);

    let timers = client.tm_read(0, 4)?;
    let counters = client.ct_read(0, 4)?;
    println!("T0-T3 raw: {:02X?}", timers);
    println!("C0-C3 raw: {:02X?}", counters);

    // =========================================================================
    // Type Decoding
    // =========================================================================

    println!("\n=== Type Decoding ===\n");

    // DB10 layout: INT at 0, DINT at 2, REAL at 6, BOOL at 10.0, STRING[20] at 12
    let record = client.db_read(10, 0, 34)?;
    println!("INT    DB10.DBW0  = {}", get_int(&record, 0)?);
    println!("DINT   DB10.DBD2  = {}", get_dint(&record, 2)?);
    println!("REAL   DB10.DBD6  = {:.3}", get_real(&record, 6)?);
    println!("BOOL   DB10.DBX10.0 = {}", get_bool(&record, 10, 0)?);
    println!("STRING DB10.DBB12 = \"{}\"", get_string(&record, 12)?);

    // Word length aware addressing: two REALs from MD100
    let reals = MemoryAddress::new(Area::Merkers, 0, 100, 2).with_word_len(WordLen::Real)?;
    let data = client.read_area(reals)?;
    println!("MD100 = {:.3}, MD104 = {:.3}", get_real(&data, 0)?, get_real(&data, 4)?);

    // =========================================================================
    // Multiple Read (Single Request)
    // =========================================================================

    println!("\n=== Multiple Read ===\n");

    let results = client.read_multi_vars(&[
        MemoryAddress::db(1, 0, 4),
        MemoryAddress::new(Area::Merkers, 0, 0, 2),
        MemoryAddress::new(Area::Counters, 0, 0, 1),
        MemoryAddress::db(999, 0, 2),
    ])?;
    for (index, item) in results.iter().enumerate() {
        match item {
            Ok(bytes) => println!("item {index}: {bytes:02X?}"),
            Err(err) => println!("item {index} failed: {err}"),
        }
    }

    client.disconnect();
    println!("\nRead example completed!");
    Ok(())
}
