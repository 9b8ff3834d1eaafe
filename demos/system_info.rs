//! Example: Reading CPU information and controlling the PLC
//!
//! Run with: cargo run --example system_info
//!
//! This example demonstrates:
//! - CPU, order code, communication and protection information
//! - Reading raw SZL lists
//! - Listing blocks and block details
//! - The PLC clock and run/stop control

use s7_client::{BlockType, Client, ClientConfig, CpuState, SZL_COMPONENT_ID};

fn main() -> s7_client::Result<()> {
    let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
    client.connect()?;

    // =========================================================================
    // Identification
    // =========================================================================

    println!("=== Identification ===\n");

    let cpu = client.get_cpu_info()?;
    println!("Module:    {}", cpu.module_type_name);
    println!("Serial:    {}", cpu.serial_number);
    println!("AS name:   {}", cpu.as_name);
    println!("Copyright: {}", cpu.copyright);

    let order = client.get_order_code()?;
    let (major, minor, patch) = order.version;
    println!("Order code: {} V{major}.{minor}.{patch}", order.code);

    let cp = client.get_cp_info()?;
    println!("Max PDU {}, max connections {}", cp.max_pdu_length, cp.max_connections);

    let protection = client.get_protection()?;
    println!("Protection level {}", protection.sch_rel);

    // =========================================================================
    // SZL
    // =========================================================================

    println!("\n=== SZL ===\n");

    let ids = client.read_szl_list()?;
    println!("{} SZL ids available", ids.len());

    let components = client.read_szl(SZL_COMPONENT_ID, 0)?;
    println!(
        "SZL 0x001C: {} records of {} bytes",
        components.header.n_dr, components.header.length_dr
    );

    // =========================================================================
    // Blocks
    // =========================================================================

    println!("\n=== Blocks ===\n");

    let blocks = client.list_blocks()?;
    for kind in BlockType::ALL {
        println!("{kind:?}: {}", blocks.count(kind));
    }
    for number in client.list_blocks_of_type(BlockType::DB, 8)? {
        let info = client.get_block_info(BlockType::DB, number)?;
        println!("DB{number}: {} bytes, author {:?}, changed {}", info.mc7_size, info.author, info.code_date);
    }

    // =========================================================================
    // Clock and Control
    // =========================================================================

    println!("\n=== Clock and Control ===\n");

    println!("PLC time: {}", client.get_plc_datetime()?);
    client.set_plc_system_datetime()?;

    match client.get_cpu_state()? {
        CpuState::Run => println!("CPU is in RUN"),
        CpuState::Stop => println!("CPU is in STOP"),
        CpuState::Unknown(code) => println!("CPU state 0x{code:02X}"),
    }

    client.disconnect();
    Ok(())
}
