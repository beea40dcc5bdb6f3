//! Controller tests against a scripted mock transport

use super::mock_transport::{wait_until, MockDevice, MockTransport};
use grblkit_communication::{
    ConnectionParams, GrblController, GrblControllerConfig, GrblMessageKind,
};
use grblkit_core::{CommandError, ConnectionError, Error, MachineState};
use std::sync::Arc;

const BANNER: &str = "Grbl 1.1h ['$' for help]";

fn controller() -> (GrblController, Arc<MockDevice>) {
    let (transport, device) = MockTransport::new();
    (
        GrblController::new(Box::new(transport), GrblControllerConfig::default()),
        device,
    )
}

fn connected_controller() -> (GrblController, Arc<MockDevice>) {
    let (controller, device) = controller();
    device.push_response(BANNER);
    controller
        .connect(&ConnectionParams::new("mock", 115_200))
        .expect("connect");
    (controller, device)
}

#[test]
fn test_connect_returns_banner() {
    let (controller, device) = controller();
    device.push_response(BANNER);

    let banner = controller
        .connect(&ConnectionParams::new("mock", 115_200))
        .expect("connect");

    assert_eq!(banner.firmware, "Grbl");
    assert_eq!(banner.version, "1.1h");
    assert_eq!(banner.message, " ['$' for help]");
    assert!(controller.is_connected());

    // No homing feedback was scripted, so no unlock was issued.
    assert!(!device.sent_lines().iter().any(|l| l == "$X"));

    controller.disconnect().expect("disconnect");
    assert!(!controller.is_connected());
    assert!(!device.is_open());
}

#[test]
fn test_connect_rejects_non_banner_first_line() {
    let (controller, device) = controller();
    device.push_response("error:9");

    let result = controller.connect(&ConnectionParams::new("mock", 115_200));
    assert!(matches!(
        result,
        Err(Error::Connection(ConnectionError::UnexpectedBanner { .. }))
    ));
    assert!(!controller.is_connected());
    assert!(!device.is_open());
}

#[test]
fn test_connect_homing_feedback_triggers_unlock() {
    let (controller, device) = controller();
    device.push_response(BANNER);
    device.push_response("[MSG:'$H'|'$X' to unlock]");

    controller
        .connect(&ConnectionParams::new("mock", 115_200))
        .expect("connect");

    // Homing handling substitutes an unlock; exactly one $X goes out.
    assert!(wait_until(|| device.sent_lines().iter().any(|l| l == "$X")));
    assert_eq!(
        device.sent_lines().iter().filter(|l| *l == "$X").count(),
        1
    );
    controller.disconnect().unwrap();
}

#[test]
fn test_disconnect_is_idempotent() {
    let (controller, _device) = connected_controller();
    controller.disconnect().unwrap();
    controller.disconnect().unwrap();
    assert!(!controller.is_connected());
}

#[test]
fn test_invalid_commands_rejected_without_reaching_transport() {
    let (controller, device) = connected_controller();

    for bad in ["$200=5", "$27=", "$text=5.200", "$N0=G54", ""] {
        let result = controller.send_command(bad);
        assert!(
            matches!(
                result,
                Err(Error::Command(CommandError::InvalidCommand { .. }))
            ),
            "expected rejection for {:?}",
            bad
        );
    }

    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(device.sent_lines().is_empty());
    controller.disconnect().unwrap();
}

#[test]
fn test_send_command_requires_connection() {
    let (controller, _device) = controller();
    let result = controller.send_command("$23=5");
    assert!(matches!(
        result,
        Err(Error::Command(CommandError::NotConnected))
    ));
}

#[test]
fn test_command_round_trip_drains_occupancy() {
    let (controller, device) = connected_controller();
    device.set_auto_ok(true);

    controller.send_command("G0 X1").unwrap();
    assert!(wait_until(|| device.sent_lines().iter().any(|l| l == "G0 X1")));
    assert!(wait_until(|| controller.in_flight_commands() == 0));
    assert_eq!(controller.buffer_fill(), 0.0);
    controller.disconnect().unwrap();
}

#[test]
fn test_error_response_attaches_to_correct_command() {
    let (controller, device) = connected_controller();

    controller.send_command("G0 X1").unwrap();
    controller.send_command("G1 Z9").unwrap();
    controller.send_command("G0 Y2").unwrap();
    assert!(wait_until(|| device.sent_lines().len() == 3));

    // Responses arrive in order: the error belongs to the second command.
    device.push_response("ok");
    device.push_response("error:2");
    device.push_response("ok");

    assert!(wait_until(|| controller.failed()));
    let status = controller.device_status();
    let fault = status.fault().expect("fault recorded");
    assert_eq!(fault.source_line, "G1 Z9");
    assert_eq!(fault.fault.code, 2);
    assert_eq!(fault.fault.message, "Bad number format");

    // A protocol error auto-pauses the stream and sends a feed hold.
    assert!(status.paused());
    assert!(wait_until(|| device.sent_bytes().contains(&b'!')));
    assert!(!controller.is_alarm());
    controller.disconnect().unwrap();
}

#[test]
fn test_alarm_locks_until_unlock_feedback() {
    let (controller, device) = connected_controller();

    controller.send_command("G0 X100").unwrap();
    assert!(wait_until(|| !device.sent_lines().is_empty()));

    device.push_response("ALARM:1");
    assert!(wait_until(|| controller.is_alarm()));
    assert!(controller.device_status().alarm());
    assert!(controller.device_status().paused());
    assert!(controller.fault_message().starts_with("GRBL alarm 1"));

    // Operator acknowledges: unlock, then resume so the $X can go out.
    controller.disable_alarm().unwrap();
    controller.set_paused(false).unwrap();
    assert!(wait_until(|| device.sent_lines().iter().any(|l| l == "$X")));

    device.push_response("[MSG:Caution: Unlocked]");
    device.push_response("ok");
    assert!(wait_until(|| !controller.is_alarm()));
    assert!(!controller.failed());
    controller.disconnect().unwrap();
}

#[test]
fn test_backpressure_holds_queue_above_threshold() {
    let (controller, device) = connected_controller();

    // 89 bytes: 69.5% of the 128-byte buffer, goes out immediately.
    let first = format!("G0 X{}", "1".repeat(85));
    controller.send_command(&first).unwrap();
    assert!(wait_until(|| device.sent_lines().len() == 1));

    // 20 more bytes push occupancy to 85%: must not be sent yet.
    let second = format!("G0 Y{}", "2".repeat(16));
    controller.send_command(&second).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(100));
    assert_eq!(device.sent_lines().len(), 1);
    assert!(controller.buffer_fill() > 75.0);

    // Acknowledging the first command frees room; the second flows.
    device.push_response("ok");
    assert!(wait_until(|| device.sent_lines().len() == 2));
    assert_eq!(device.sent_lines()[1], second);
    controller.disconnect().unwrap();
}

#[test]
fn test_pause_gates_send_phase() {
    let (controller, device) = connected_controller();

    controller.set_paused(true).unwrap();
    assert!(wait_until(|| device.sent_bytes().contains(&b'!')));

    controller.send_command("G0 X1").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(100));
    assert!(device.sent_lines().is_empty());

    controller.set_paused(false).unwrap();
    assert!(wait_until(|| device.sent_lines().iter().any(|l| l == "G0 X1")));
    assert!(wait_until(|| device.sent_bytes().contains(&b'~')));
    controller.disconnect().unwrap();
}

#[test]
fn test_program_end_sets_finished() {
    let (controller, device) = connected_controller();
    device.set_auto_ok(true);

    controller.send_command("M03").unwrap();
    assert!(wait_until(|| device.sent_lines().iter().any(|l| l == "M03")));
    assert!(!controller.is_finished());

    controller.send_command("N120 M30").unwrap();
    assert!(wait_until(|| controller.is_finished()));
    controller.disconnect().unwrap();
}

#[test]
fn test_status_reports_merge_into_model() {
    let (controller, device) = connected_controller();

    device.push_response("<Run|MPos:1.000,2.000,3.000|FS:500,1000>");
    assert!(wait_until(|| {
        controller.device_status().report().state == MachineState::Run
    }));

    device.push_response("<Idle|WPos:4.000,5.000,6.000>");
    assert!(wait_until(|| controller.device_status().is_idle()));

    let status = controller.device_status();
    let report = status.report();
    assert_eq!(report.mpos, Some(grblkit_core::Position::new(1.0, 2.0, 3.0)));
    assert_eq!(report.wpos, Some(grblkit_core::Position::new(4.0, 5.0, 6.0)));
    assert_eq!(report.feed_rate, Some(500.0));
    controller.disconnect().unwrap();
}

#[test]
fn test_status_poll_is_out_of_band() {
    let (controller, device) = connected_controller();

    // The poller queries with the realtime byte, not a queued line.
    assert!(wait_until(|| device.sent_bytes().contains(&b'?')));
    assert_eq!(controller.buffer_fill(), 0.0);
    assert!(device.sent_lines().is_empty());
    controller.disconnect().unwrap();
}

#[test]
fn test_check_mode_feedback() {
    let (controller, device) = connected_controller();
    device.set_auto_ok(true);

    controller.toggle_check_mode().unwrap();
    assert!(wait_until(|| device.sent_lines().iter().any(|l| l == "$C")));

    device.push_response("[MSG:Enabled]");
    assert!(wait_until(|| controller.device_status().check_mode()));

    device.push_response("[MSG:Disabled]");
    assert!(wait_until(|| !controller.device_status().check_mode()));
    controller.disconnect().unwrap();
}

#[test]
fn test_captures_settings_parameters_and_build_info() {
    let (controller, device) = connected_controller();

    device.push_response("$10=255");
    device.push_response("[G54:1.000,2.000,3.000]");
    device.push_response("[VER:1.1h.20190825:]");
    device.push_response("[OPT:V,15,128]");
    device.push_response("[HLP:$$ $# $G $I $N x=val]");

    assert!(wait_until(|| controller.settings().get(10).is_some()));
    assert_eq!(controller.settings().get(10), Some("255"));

    assert!(wait_until(|| controller.parameters().contains_key("G54")));
    assert!(wait_until(|| {
        controller.build_info().version.as_deref() == Some("1.1h.20190825")
    }));
    assert!(wait_until(|| controller.build_info().options.is_some()));
    assert_eq!(
        controller.build_info().options.map(|o| o.rx_buffer),
        Some(Some(128))
    );
    assert!(wait_until(|| controller.help_text().is_some()));
    controller.disconnect().unwrap();
}

#[test]
fn test_jog_command_construction_and_dispatch() {
    let (controller, device) = connected_controller();
    device.set_auto_ok(true);

    controller
        .jog(
            1.0,
            2.0,
            0.0,
            500.0,
            Some(grblkit_core::Units::INCH),
            Some(grblkit_core::DistanceMode::Absolute),
            true,
        )
        .unwrap();

    assert!(wait_until(|| device
        .sent_lines()
        .iter()
        .any(|l| l == "$J=G53 G90 G20 X1.0 Y2.0 Z0.0 F500.0")));
    controller.disconnect().unwrap();
}

#[test]
fn test_set_settings_issues_one_write_per_entry() {
    let (controller, device) = connected_controller();
    device.set_auto_ok(true);

    let mut settings = std::collections::BTreeMap::new();
    settings.insert(23, "5".to_string());
    settings.insert(27, "5.200".to_string());
    controller.set_settings(&settings).unwrap();

    assert!(wait_until(|| device.sent_lines().len() == 2));
    assert_eq!(device.sent_lines(), vec!["$23=5", "$27=5.200"]);
    controller.disconnect().unwrap();
}

#[test]
fn test_transport_failure_tears_down_session() {
    let (controller, device) = connected_controller();
    assert!(controller.is_connected());

    device.kill();
    assert!(wait_until(|| !controller.is_connected()));

    // The queue was drained on teardown.
    assert_eq!(controller.pending_commands(), 0);
    controller.disconnect().unwrap();
}

#[test]
fn test_unrecognized_lines_do_not_disturb_state() {
    let (controller, device) = connected_controller();

    device.push_response("@@garbage@@");
    device.push_response("<Idle>");
    assert!(wait_until(|| controller.device_status().is_idle()));
    assert!(!controller.failed());
    controller.disconnect().unwrap();
}

#[test]
fn test_kind_name_for_logging() {
    let message = grblkit_communication::parse_line("ok");
    assert_eq!(message.kind_name(), "Ok");
    assert!(matches!(message.kind, GrblMessageKind::Ok));
}
