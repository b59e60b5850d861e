//! Tests for the Gen2 command buffer flow through the engine.

use gen2_commands::{Gen2Command, MemoryBank, ReadArgs, SelectArgs, SelectTarget, WriteArgs};
use reader_core::mock::{DeviceCall, MockDevice};
use reader_core::{
    event_queue, ActiveRegion, ContinuousInventoryEngine, EnableKind, Gen2BufferError, Region,
};

fn engine(device: MockDevice) -> ContinuousInventoryEngine<MockDevice> {
    let (tx, _rx) = event_queue(16);
    ContinuousInventoryEngine::new(device, ActiveRegion::new(Region::fcc()), tx)
}

fn read(word_pointer: u32) -> Gen2Command {
    Gen2Command::Read(ReadArgs {
        memory_bank: MemoryBank::User,
        word_pointer,
        word_count: 1,
    })
}

#[test]
fn append_write_and_enable_round_trip() {
    let device = MockDevice::new();
    let mut engine = engine(device.clone());

    // Three commands land in slots 0, 1, 2.
    assert_eq!(engine.gen2_append_command(&read(0), 10).unwrap(), 0);
    assert_eq!(
        engine
            .gen2_append_command(
                &Gen2Command::Write(WriteArgs {
                    memory_bank: MemoryBank::User,
                    word_pointer: 4,
                    data: 0xCAFE,
                }),
                11,
            )
            .unwrap(),
        1
    );
    assert_eq!(engine.gen2_append_command(&read(8), 12).unwrap(), 2);

    engine.gen2_write_sequence().unwrap();

    // The three enable sets are programmed independently.
    assert_eq!(
        engine
            .gen2_write_halted_enables(&[true, true, false])
            .unwrap(),
        2
    );
    assert_eq!(
        engine
            .gen2_write_auto_access_enables(&[false, false, true])
            .unwrap(),
        1
    );
    assert_eq!(
        engine.gen2_write_select_enables(&[false, false, false]).unwrap(),
        0
    );

    let calls = device.calls();
    assert!(calls.contains(&DeviceCall::WriteSequence(3)));
    assert!(calls.contains(&DeviceCall::WriteEnables(
        EnableKind::Halted,
        vec![true, true, false]
    )));
    assert!(calls.contains(&DeviceCall::WriteEnables(
        EnableKind::AutoAccess,
        vec![false, false, true]
    )));
    assert!(calls.contains(&DeviceCall::WriteEnables(
        EnableKind::Select,
        vec![false, false, false]
    )));
}

#[test]
fn enable_for_empty_slot_is_rejected() {
    let device = MockDevice::new();
    let mut engine = engine(device.clone());

    engine.gen2_append_command(&read(0), 1).unwrap();
    assert_eq!(
        engine.gen2_write_halted_enables(&[true, true]),
        Err(Gen2BufferError::EnabledEmptySlot { slot: 1 })
    );
    // Nothing reached the device.
    assert!(device.calls().is_empty());
}

#[test]
fn write_sequence_requires_commands() {
    let device = MockDevice::new();
    let mut engine = engine(device);

    assert_eq!(
        engine.gen2_write_sequence(),
        Err(Gen2BufferError::EmptySequence)
    );
}

#[test]
fn clear_restarts_slot_assignment() {
    let device = MockDevice::new();
    let mut engine = engine(device);

    engine.gen2_append_command(&read(0), 1).unwrap();
    engine.gen2_append_command(&read(2), 2).unwrap();
    engine.gen2_clear_local_sequence();

    let select = Gen2Command::Select(SelectArgs {
        target: SelectTarget::Session1,
        action: 0,
        memory_bank: MemoryBank::Epc,
        bit_pointer: 0x20,
        bit_length: 8,
        mask: vec![0x3A],
        truncate: false,
    });
    assert_eq!(engine.gen2_append_command(&select, 3).unwrap(), 0);
    assert_eq!(engine.gen2_command_at(0), Some(&select));
    assert_eq!(engine.gen2_command_at(1), None);
}
