mod common;

use chrono::NaiveDate;
use common::{connected_client, SimulatedPlc, DB1_SIZE, ORDER_CODE, SERIAL};
use s7_client::{
    status, BlockType, Client, ClientConfig, CpInfo, CpuState, Protection, S7Error, SZL_COMPONENT_ID,
};

#[test]
fn test_fragmented_szl_is_reassembled() {
    let (mut client, plc) = connected_client();

    let before = plc.exchanges();
    let list = client.read_szl(SZL_COMPONENT_ID, 0).unwrap();
    // 348 byte answer in 200 byte fragments
    assert_eq!(plc.exchanges() - before, 2);
    assert_eq!(list.header.length_dr, 34);
    assert_eq!(list.header.n_dr, 10);
    assert_eq!(list.data.len(), 340);

    plc.set_fragment_size(50);
    let before = plc.exchanges();
    let small = client.read_szl(SZL_COMPONENT_ID, 0).unwrap();
    assert_eq!(plc.exchanges() - before, 7);
    assert_eq!(small, list);
}

#[test]
fn test_szl_single_records() {
    let (mut client, _plc) = connected_client();

    let serial = client.read_szl(0x011C, 5).unwrap();
    assert_eq!(serial.header.n_dr, 1);
    let mut expected = SERIAL.as_bytes().to_vec();
    expected.resize(24, 0);
    assert_eq!(&serial.data[2..26], expected.as_slice());

    let module = client.read_szl(0x0111, 1).unwrap();
    assert_eq!(&module.data[2..22], ORDER_CODE.as_bytes());

    let ids = client.read_szl_list().unwrap();
    assert!(ids.contains(&0x001C));
    assert!(ids.contains(&0x0424));
}

#[test]
fn test_unknown_szl_is_rejected() {
    let (mut client, _plc) = connected_client();
    assert_eq!(
        client.read_szl(0xFFFF, 0).unwrap_err(),
        S7Error::protocol(status::CLI_ITEM_NOT_AVAILABLE)
    );
    assert!(matches!(client.read_szl(0xFFFF, 0xFFFF), Err(S7Error::Protocol { .. })));
    assert!(client.get_connected());
}

#[test]
fn test_identification() {
    let (mut client, _plc) = connected_client();

    let info = client.get_cpu_info().unwrap();
    assert_eq!(info.as_name, "SNAP7-SERVER");
    assert_eq!(info.module_type_name, "CPU 315-2 PN/DP");
    assert_eq!(info.serial_number, SERIAL);
    assert_eq!(info.copyright, "Original Siemens Equipment");
    assert_eq!(info.module_name, "CPU 315-2 PN/DP");

    let order = client.get_order_code().unwrap();
    assert_eq!(order.code, ORDER_CODE);
    assert_eq!(order.version, (3, 2, 6));

    assert_eq!(
        client.get_cp_info().unwrap(),
        CpInfo {
            max_pdu_length: 2048,
            max_connections: 0,
            max_mpi_rate: 1024,
            max_bus_rate: 0,
        }
    );
    assert_eq!(
        client.get_protection().unwrap(),
        Protection {
            sch_schal: 1,
            sch_par: 0,
            sch_rel: 1,
            bart_sch: 2,
            anl_sch: 0,
        }
    );
}

#[test]
fn test_run_stop_cycle() {
    let (mut client, plc) = connected_client();
    assert_eq!(client.get_cpu_state().unwrap(), CpuState::Run);

    client.plc_stop().unwrap();
    assert!(!plc.is_running());
    assert_eq!(client.get_cpu_state().unwrap(), CpuState::Stop);
    assert_eq!(client.plc_stop().unwrap_err(), S7Error::protocol(status::CLI_ALREADY_STOP));

    client.plc_hot_start().unwrap();
    assert_eq!(client.get_cpu_state().unwrap(), CpuState::Run);
    assert_eq!(
        client.plc_cold_start().unwrap_err(),
        S7Error::protocol(status::CLI_ALREADY_RUN)
    );

    client.copy_ram_to_rom().unwrap();
    client.compress().unwrap();
}

#[test]
fn test_block_directory() {
    let (mut client, _plc) = connected_client();

    let blocks = client.list_blocks().unwrap();
    assert_eq!(blocks.ob, 1);
    assert_eq!(blocks.db, 2);
    assert_eq!(blocks.count(BlockType::FB), 0);

    assert_eq!(client.list_blocks_of_type(BlockType::DB, 10).unwrap(), vec![1, 2]);
    assert_eq!(client.list_blocks_of_type(BlockType::DB, 1).unwrap(), vec![1]);
    assert!(client.list_blocks_of_type(BlockType::SFB, 10).unwrap().is_empty());
    assert!(matches!("NoBlockType".parse::<BlockType>(), Err(S7Error::Validation { .. })));
}

#[test]
fn test_block_info() {
    let (mut client, _plc) = connected_client();

    let info = client.get_block_info(BlockType::DB, 1).unwrap();
    assert_eq!(info.kind(), Some(BlockType::DB));
    assert_eq!(info.block_number, 1);
    assert_eq!(usize::from(info.mc7_size), DB1_SIZE);
    assert_eq!(info.sbb_length, 42);
    assert_eq!(info.author, "SNAP7");
    assert_eq!(info.code_date, NaiveDate::from_ymd_opt(2019, 6, 27).unwrap());

    assert_eq!(
        client.get_block_info(BlockType::DB, 10).unwrap_err(),
        S7Error::protocol(status::CLI_ITEM_NOT_AVAILABLE)
    );
}

#[test]
fn test_session_password() {
    let (mut client, plc) = connected_client();
    plc.set_password(Some("secret"));

    client.set_session_password("secret").unwrap();
    assert!(client.has_session_password());

    let err = client.set_session_password("wrong").unwrap_err();
    assert_eq!(err, S7Error::Auth { code: status::CLI_INVALID_PASSWORD });

    let before = plc.exchanges();
    let err = client.set_session_password("much too long").unwrap_err();
    assert!(matches!(err, S7Error::Validation { .. }));
    assert_eq!(plc.exchanges(), before);

    client.clear_session_password().unwrap();
    assert!(!client.has_session_password());
}

#[test]
fn test_configured_password_is_sent_on_connect() {
    let plc = SimulatedPlc::new();
    plc.set_password(Some("pass"));

    let config = ClientConfig::new("plc.local", 0, 2).with_password("nope");
    let mut client = Client::with_transport(config, plc.clone());
    let err = client.connect().unwrap_err();
    assert!(matches!(err, S7Error::Auth { .. }));
    assert!(!client.get_connected());

    let config = ClientConfig::new("plc.local", 0, 2).with_password("pass");
    let mut client = Client::with_transport(config, plc);
    client.connect().unwrap();
    assert!(client.has_session_password());
}

#[test]
fn test_plc_clock() {
    let (mut client, plc) = connected_client();

    let now = client.get_plc_datetime().unwrap();
    assert_eq!(
        now,
        NaiveDate::from_ymd_opt(2019, 6, 27).unwrap().and_hms_opt(10, 0, 0).unwrap()
    );

    let moment = NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_milli_opt(12, 30, 45, 123)
        .unwrap();
    client.set_plc_datetime(moment).unwrap();
    // Friday is day 6 counted from Sunday
    assert_eq!(plc.clock(), [0x24, 0x03, 0x15, 0x12, 0x30, 0x45, 0x12, 0x36]);
    assert_eq!(client.get_plc_datetime().unwrap(), moment);

    client.set_plc_system_datetime().unwrap();
}

#[test]
fn test_clock_year_boundaries() {
    let (mut client, plc) = connected_client();
    let new_year = |year| {
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    };

    for year in [1990, 2089] {
        client.set_plc_datetime(new_year(year)).unwrap();
        assert_eq!(client.get_plc_datetime().unwrap(), new_year(year));
    }

    let clock = plc.clock();
    let before = plc.exchanges();
    for year in [1989, 2090, -5, 12_000] {
        let err = client.set_plc_datetime(new_year(year)).unwrap_err();
        assert!(matches!(err, S7Error::Validation { code, .. } if code == status::CLI_INVALID_VALUE));
        assert_eq!(client.get_last_error(), status::CLI_INVALID_VALUE);
    }
    assert_eq!(plc.exchanges(), before);
    assert_eq!(plc.clock(), clock);
}

#[test]
fn test_block_transfer_is_unsupported() {
    let (mut client, plc) = connected_client();
    let before = plc.exchanges();
    assert!(matches!(
        client.full_upload(BlockType::OB, 1),
        Err(S7Error::Unsupported { .. })
    ));
    assert!(client.upload(BlockType::DB, 1).is_err());
    assert!(client.download(1, &[0u8; 16]).is_err());
    assert!(client.delete_block(BlockType::DB, 1).is_err());
    assert_eq!(client.get_last_error(), status::CLI_FUNCTION_NOT_IMPLEMENTED);
    assert_eq!(plc.exchanges(), before);
}
