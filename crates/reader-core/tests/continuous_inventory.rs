//! End-to-end tests for the continuous inventory engine, driving it with a
//! scripted device and synthetic event streams.

use gen2_events::{
    encode_packet, EventPacket, InventoryRoundSummaryFields, PacketType, RampDownReason,
    StaticData, StopReason, SummaryReason, TagReadFields,
};
use reader_core::mock::{DeviceCall, MockDevice};
use reader_core::{
    event_queue, ActiveRegion, ContinuousInventoryEngine, DeviceError, InventoryPhase, OpError,
    OpId, PacketReceiver, ReaderError, Region, RfMode, SessionParams, StopConditions, Target,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn engine_with_queue(
    device: MockDevice,
    capacity: usize,
) -> (ContinuousInventoryEngine<MockDevice>, PacketReceiver) {
    let (tx, rx) = event_queue(capacity);
    let region = ActiveRegion::new(Region::etsi_lower());
    (ContinuousInventoryEngine::new(device, region, tx), rx)
}

fn session(stop: StopConditions) -> SessionParams {
    let mut params = SessionParams::new(RfMode(13), 2700);
    params.stop_conditions = stop;
    params
}

fn round_summary_bytes(us: u32, reason: SummaryReason, final_q: u8) -> Vec<u8> {
    let packet = EventPacket::round_summary(
        us,
        InventoryRoundSummaryFields {
            duration_us: 10_000,
            total_slots: 16,
            num_slots: 16,
            num_tags: 0,
            reason: reason as u8,
            final_q,
            min_q_count: 0,
            queries_since_valid_epc_count: 0,
        },
    );
    let mut buf = Vec::new();
    encode_packet(&packet, &mut buf);
    buf
}

fn tag_read_bytes(us: u32) -> Vec<u8> {
    let packet = EventPacket::tag_read(us, TagReadFields::default(), vec![0xE2, 0x00, 0x12]);
    let mut buf = Vec::new();
    encode_packet(&packet, &mut buf);
    buf
}

fn drain_types(rx: &mut PacketReceiver) -> Vec<PacketType> {
    let mut types = Vec::new();
    while let Some(packet) = rx.pop() {
        types.push(packet.packet_type());
    }
    types
}

#[test]
fn seven_done_rounds_end_a_seven_round_session() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device.clone(), 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 7,
            ..Default::default()
        }))
        .unwrap();

    for round in 0..7u32 {
        let us = (round + 1) * 50_000;
        engine.handle_event_bytes(&round_summary_bytes(us, SummaryReason::Done, 4));
    }

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::MaxNumberOfRounds));
    assert_eq!(state.round_count, 7);

    // Exactly one session summary, after the seven round summaries.
    let types = drain_types(&mut rx);
    let summaries: Vec<&PacketType> = types
        .iter()
        .filter(|ty| **ty == PacketType::ContinuousInventorySummary)
        .collect();
    assert_eq!(summaries.len(), 1);
    assert_eq!(*types.last().unwrap(), PacketType::ContinuousInventorySummary);

    // Seven rounds were issued, no eighth.
    assert_eq!(device.start_round_calls().len(), 7);
}

#[test]
fn dual_target_flips_between_rounds() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device.clone(), 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 4,
            ..Default::default()
        }))
        .unwrap();
    for round in 0..3u32 {
        engine.handle_event_bytes(&round_summary_bytes((round + 1) * 1000, SummaryReason::Done, 4));
    }

    let targets: Vec<Target> = device
        .start_round_calls()
        .iter()
        .map(|call| match call {
            DeviceCall::StartRound { target, .. } => *target,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(targets, vec![Target::A, Target::B, Target::A, Target::B]);
}

#[test]
fn session_summary_duration_is_clamped_to_the_requested_maximum() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device, 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_duration_us: 2_000_000,
            ..Default::default()
        }))
        .unwrap();

    // The round summary that trips the check arrives well past the limit.
    engine.handle_event_bytes(&round_summary_bytes(2_345_678, SummaryReason::Done, 4));

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.stop_reason, Some(StopReason::MaxDuration));

    let mut summary = None;
    while let Some(packet) = rx.pop() {
        if let StaticData::ContinuousInventorySummary(fields) = packet.static_data {
            summary = Some(fields);
        }
    }
    let summary = summary.expect("session summary not published");
    assert_eq!(summary.duration_us, 2_000_000);
    assert_eq!(summary.reason, StopReason::MaxDuration as u8);
}

#[test]
fn tag_count_stop_condition_uses_at_least_semantics() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device, 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_tags: 3,
            ..Default::default()
        }))
        .unwrap();

    // Five tags sneak in before the round summary runs the check.
    for i in 0..5u32 {
        engine.handle_event_bytes(&tag_read_bytes(1000 + i));
    }
    engine.handle_event_bytes(&round_summary_bytes(10_000, SummaryReason::Done, 4));

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::MaxNumberOfTags));
    assert_eq!(state.tag_count, 5);
}

#[test]
fn fatal_round_reason_publishes_result_then_summary() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device, 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 100,
            ..Default::default()
        }))
        .unwrap();
    engine.handle_event_bytes(&round_summary_bytes(5000, SummaryReason::EventFifoFull, 4));

    let types = drain_types(&mut rx);
    assert_eq!(
        types,
        vec![
            PacketType::InventoryRoundSummary,
            PacketType::Result,
            PacketType::ContinuousInventorySummary,
        ]
    );

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::EventFifoFull));
}

#[test]
fn unknown_summary_reason_is_session_fatal() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device, 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 100,
            ..Default::default()
        }))
        .unwrap();

    let packet = EventPacket::round_summary(
        5000,
        InventoryRoundSummaryFields {
            reason: 0xEE,
            ..Default::default()
        },
    );
    let mut buf = Vec::new();
    encode_packet(&packet, &mut buf);
    engine.handle_event_bytes(&buf);

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::SummaryReasonInvalid));
    assert_eq!(
        *drain_types(&mut rx).last().unwrap(),
        PacketType::ContinuousInventorySummary
    );
}

#[test]
fn host_stop_is_observed_at_the_next_round_summary() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device.clone(), 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 100,
            ..Default::default()
        }))
        .unwrap();
    engine.stop_transmitting().unwrap();

    // Nothing stops until the in-flight round reports.
    assert_eq!(
        engine.get_continuous_inventory_state().phase,
        InventoryPhase::StopRequested
    );

    engine.handle_event_bytes(&round_summary_bytes(40_000, SummaryReason::Done, 4));

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::Host));
    assert_eq!(state.round_count, 1);

    let mut summary_reason = None;
    while let Some(packet) = rx.pop() {
        if let StaticData::ContinuousInventorySummary(fields) = packet.static_data {
            summary_reason = Some(fields.reason);
        }
    }
    assert_eq!(summary_reason, Some(StopReason::Host as u8));

    // The carrier dropped when the stop was requested.
    assert!(device.calls().contains(&DeviceCall::RampDown));
}

#[test]
fn stop_transmitting_is_idempotent_when_idle() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device, 16);

    engine.stop_transmitting().unwrap();
    engine.stop_transmitting().unwrap();

    assert_eq!(engine.get_continuous_inventory_state().phase, InventoryPhase::Idle);
    assert!(rx.pop().is_none());
}

#[test]
fn first_stop_reason_wins() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device, 64);

    // Both conditions are satisfied by the same summary; rounds are
    // checked first and must win.
    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 1,
            max_duration_us: 1,
            ..Default::default()
        }))
        .unwrap();
    engine.handle_event_bytes(&round_summary_bytes(50_000, SummaryReason::Done, 4));

    assert_eq!(
        engine.get_continuous_inventory_state().stop_reason,
        Some(StopReason::MaxNumberOfRounds)
    );
}

#[test]
fn regulatory_interruption_carries_q_state_forward() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device.clone(), 64);

    let mut params = session(StopConditions {
        max_number_of_rounds: 100,
        ..Default::default()
    });
    params.round_config.session = 1;
    engine.continuous_inventory(params).unwrap();

    // Regulatory ramp-down mid-round; the device carrier is off now.
    device.set_cw_on(false);
    let packet = EventPacket::round_summary(
        60_000,
        InventoryRoundSummaryFields {
            reason: SummaryReason::Regulatory as u8,
            final_q: 7,
            min_q_count: 2,
            queries_since_valid_epc_count: 3,
            ..Default::default()
        },
    );
    let mut buf = Vec::new();
    encode_packet(&packet, &mut buf);
    engine.handle_event_bytes(&buf);

    let starts = device.start_round_calls();
    assert_eq!(starts.len(), 2);
    match &starts[1] {
        DeviceCall::StartRound {
            initial_q,
            starting_min_q_count,
            starting_queries_count,
            ..
        } => {
            assert_eq!(*initial_q, 7);
            assert_eq!(*starting_min_q_count, 2);
            assert_eq!(*starting_queries_count, 3);
        }
        _ => unreachable!(),
    }

    // An interrupted round does not count.
    assert_eq!(engine.get_continuous_inventory_state().round_count, 0);
}

#[test]
fn single_target_regulatory_continuation_carries_q() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device.clone(), 64);

    // Single target, session 0. The carrier being down must not reset
    // this session: the caller picked target B and the interrupted
    // round's Q has to survive into the continuation.
    let mut params = session(StopConditions {
        max_number_of_rounds: 100,
        ..Default::default()
    });
    params.dual_target = false;
    params.round_config.target = Target::B;
    engine.continuous_inventory(params).unwrap();

    device.set_cw_on(false);
    let packet = EventPacket::round_summary(
        60_000,
        InventoryRoundSummaryFields {
            reason: SummaryReason::Regulatory as u8,
            final_q: 7,
            min_q_count: 2,
            queries_since_valid_epc_count: 3,
            ..Default::default()
        },
    );
    let mut buf = Vec::new();
    encode_packet(&packet, &mut buf);
    engine.handle_event_bytes(&buf);

    let starts = device.start_round_calls();
    assert_eq!(starts.len(), 2);
    match &starts[1] {
        DeviceCall::StartRound {
            target,
            initial_q,
            starting_min_q_count,
            starting_queries_count,
            ..
        } => {
            assert_eq!(*target, Target::B);
            assert_eq!(*initial_q, 7);
            assert_eq!(*starting_min_q_count, 2);
            assert_eq!(*starting_queries_count, 3);
        }
        _ => unreachable!(),
    }
}

#[test]
fn single_round_inventory_validates_select() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device.clone(), 16);

    let mut params = session(StopConditions::default());
    params.round_config.select = 4;
    assert_eq!(
        engine.inventory(params),
        Err(ReaderError::InvalidParameter("select"))
    );
    assert!(device.calls().is_empty());
}

#[test]
fn session_zero_resets_to_target_a_when_carrier_drops() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device.clone(), 64);

    let mut params = session(StopConditions {
        max_number_of_rounds: 100,
        ..Default::default()
    });
    params.round_config.initial_q = 5;
    engine.continuous_inventory(params).unwrap();

    // One full round flips to target B.
    engine.handle_event_bytes(&round_summary_bytes(10_000, SummaryReason::Done, 3));
    // The carrier drops, then a regulatory summary comes in. Session 0
    // flags decayed, so the engine must restart on target A with fresh Q.
    device.set_cw_on(false);
    engine.handle_event_bytes(&round_summary_bytes(20_000, SummaryReason::Regulatory, 6));

    let starts = device.start_round_calls();
    assert_eq!(starts.len(), 3);
    match &starts[2] {
        DeviceCall::StartRound {
            target, initial_q, ..
        } => {
            assert_eq!(*target, Target::A);
            assert_eq!(*initial_q, 5);
        }
        _ => unreachable!(),
    }
}

#[test]
fn select_race_retries_exactly_once() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device.clone(), 64);

    device.script_start_round(Err(DeviceError::op(OpId::SendSelect, OpError::InvalidTxState)));
    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 1,
            ..Default::default()
        }))
        .unwrap();

    // One failed attempt, one successful retry, two ramps.
    assert_eq!(device.start_round_calls().len(), 2);
    let ramps = device
        .calls()
        .iter()
        .filter(|call| matches!(call, DeviceCall::RampUp { .. }))
        .count();
    assert_eq!(ramps, 2);
}

#[test]
fn second_select_race_failure_is_reported() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device.clone(), 64);

    let race = DeviceError::op(OpId::SendSelect, OpError::InvalidTxState);
    device.script_start_round(Err(race));
    device.script_start_round(Err(race));

    let result = engine.continuous_inventory(session(StopConditions {
        max_number_of_rounds: 1,
        ..Default::default()
    }));
    assert_eq!(result, Err(ReaderError::Device(race)));
    assert_eq!(engine.get_continuous_inventory_state().phase, InventoryPhase::Idle);
}

#[test]
fn device_error_mid_session_fails_the_session() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device.clone(), 64);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 100,
            ..Default::default()
        }))
        .unwrap();

    // The continuation round fails with an op error.
    device.script_start_round(Err(DeviceError::op(
        OpId::StartInventoryRound,
        OpError::InvalidParams,
    )));
    engine.handle_event_bytes(&round_summary_bytes(30_000, SummaryReason::Done, 4));

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::OpError));

    let mut summary = None;
    let mut saw_result = false;
    while let Some(packet) = rx.pop() {
        match packet.static_data {
            StaticData::Result(fields) => {
                saw_result = true;
                assert_eq!(fields.op_id, OpId::StartInventoryRound as u8);
                assert_eq!(fields.op_error, OpError::InvalidParams as u8);
            }
            StaticData::ContinuousInventorySummary(fields) => summary = Some(fields),
            _ => {}
        }
    }
    assert!(saw_result);
    let summary = summary.expect("session summary not published");
    assert_eq!(summary.last_op_id, OpId::StartInventoryRound as u8);
    assert_eq!(summary.reason, StopReason::OpError as u8);
}

#[test]
fn rejected_parameters_leave_the_engine_untouched() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device.clone(), 16);

    let result = engine.continuous_inventory(session(StopConditions::default()));
    assert_eq!(result, Err(ReaderError::InvalidParameter("stop_conditions")));
    assert_eq!(engine.get_continuous_inventory_state().phase, InventoryPhase::Idle);
    assert!(device.calls().is_empty());
    assert!(rx.pop().is_none());
}

#[test]
fn malformed_record_discards_the_rest_of_the_buffer() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device, 16);

    let mut buf = tag_read_bytes(100);
    buf.extend_from_slice(&[0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE]);
    buf.extend_from_slice(&tag_read_bytes(200));
    engine.handle_event_bytes(&buf);

    // Only the packet before the corruption survives.
    assert_eq!(rx.pop().unwrap().us_counter, 100);
    assert!(rx.pop().is_none());
}

#[test]
fn queue_overflow_is_session_fatal() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, mut rx) = engine_with_queue(device, 1);

    engine
        .continuous_inventory(session(StopConditions {
            max_number_of_rounds: 100,
            ..Default::default()
        }))
        .unwrap();

    engine.handle_event_bytes(&tag_read_bytes(100));
    engine.handle_event_bytes(&tag_read_bytes(200));

    let state = engine.get_continuous_inventory_state();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::EventFifoFull));

    // The first packet made it through before the overflow.
    assert_eq!(rx.pop().unwrap().us_counter, 100);
}

#[test]
fn ramp_packets_drive_dwell_bookkeeping() {
    init_tracing();
    let device = MockDevice::new();
    let (mut engine, _rx) = engine_with_queue(device, 16);

    let mut buf = Vec::new();
    encode_packet(&EventPacket::tx_ramp_up(1_000_000, 865_900), &mut buf);
    encode_packet(
        &EventPacket::tx_ramp_down(1_040_000, RampDownReason::Regulatory),
        &mut buf,
    );
    encode_packet(&EventPacket::tx_ramp_up(1_139_000, 865_900), &mut buf);
    engine.handle_event_bytes(&buf);

    // 40 ms on plus a 99 ms rest inside the 100 ms quiet window.
    assert_eq!(engine.region().tracker().accumulated_on_ms(4, 1139), 139);
}
