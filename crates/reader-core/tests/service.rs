//! Tests for the delivery-thread wrapper.

use std::time::Duration;

use gen2_events::{
    encode_packet, EventPacket, InventoryRoundSummaryFields, PacketType, StopReason,
    SummaryReason,
};
use reader_core::mock::MockDevice;
use reader_core::{
    event_queue, ActiveRegion, ContinuousInventoryEngine, InventoryPhase, ReaderError,
    ReaderService, Region, RfMode, SessionParams, StopConditions,
};

fn spawn_service(device: MockDevice) -> (reader_core::ReaderHandle, reader_core::PacketReceiver) {
    let (tx, rx) = event_queue(64);
    let engine =
        ContinuousInventoryEngine::new(device, ActiveRegion::new(Region::etsi_lower()), tx);
    (ReaderService::spawn(engine), rx)
}

fn summary_bytes(us: u32) -> Vec<u8> {
    let packet = EventPacket::round_summary(
        us,
        InventoryRoundSummaryFields {
            reason: SummaryReason::Done as u8,
            final_q: 4,
            ..Default::default()
        },
    );
    let mut buf = Vec::new();
    encode_packet(&packet, &mut buf);
    buf
}

#[test]
fn session_runs_to_completion_through_the_handle() {
    let device = MockDevice::new();
    let (handle, mut rx) = spawn_service(device);

    let mut params = SessionParams::new(RfMode(5), 2400);
    params.stop_conditions = StopConditions {
        max_number_of_rounds: 2,
        ..Default::default()
    };
    handle.start_session(params).unwrap();

    handle.feed_event_bytes(summary_bytes(10_000)).unwrap();
    handle.feed_event_bytes(summary_bytes(20_000)).unwrap();

    // Event bytes are processed asynchronously; the summary shows up on
    // the queue once the delivery thread gets to them.
    assert!(rx.wait_with_timeout(Duration::from_secs(1)));

    let mut saw_summary = false;
    while rx.wait_with_timeout(Duration::from_millis(200)) {
        if let Some(packet) = rx.pop() {
            if packet.packet_type() == PacketType::ContinuousInventorySummary {
                saw_summary = true;
                break;
            }
        }
    }
    assert!(saw_summary);

    let state = handle.snapshot().unwrap();
    assert_eq!(state.phase, InventoryPhase::Idle);
    assert_eq!(state.stop_reason, Some(StopReason::MaxNumberOfRounds));
    assert_eq!(state.round_count, 2);
}

#[test]
fn parameter_errors_come_back_synchronously() {
    let device = MockDevice::new();
    let (handle, _rx) = spawn_service(device);

    let params = SessionParams::new(RfMode(5), 2400);
    assert_eq!(
        handle.start_session(params),
        Err(ReaderError::InvalidParameter("stop_conditions"))
    );
}

#[test]
fn inserted_packets_reach_the_queue() {
    let device = MockDevice::new();
    let (handle, mut rx) = spawn_service(device);

    handle
        .insert_packet(EventPacket::custom(42, vec![1, 2, 3]))
        .unwrap();
    assert!(rx.wait_with_timeout(Duration::from_secs(1)));
    let packet = rx.pop().unwrap();
    assert_eq!(packet.packet_type(), PacketType::Custom);
    assert_eq!(packet.dynamic_data, vec![1, 2, 3]);
}

#[test]
fn dropping_the_handle_stops_the_thread() {
    let device = MockDevice::new();
    let (handle, _rx) = spawn_service(device);
    handle.snapshot().unwrap();
    drop(handle);
}
