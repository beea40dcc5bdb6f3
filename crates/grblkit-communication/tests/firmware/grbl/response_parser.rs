//! Response grammar tests

use grblkit_communication::firmware::grbl::messages::{
    GrblMessageKind, ModalGroup, ParameterValue,
};
use grblkit_communication::parse_line;
use grblkit_core::{MachineState, Position};
use proptest::prelude::*;

#[test]
fn test_parse_ok() {
    assert_eq!(parse_line("ok").kind, GrblMessageKind::Ok);
}

#[test]
fn test_parse_error_resolves_table() {
    let message = parse_line("error:9");
    let GrblMessageKind::Error(fault) = message.kind else {
        panic!("expected error, got {:?}", message.kind);
    };
    assert_eq!(fault.code, 9);
    assert_eq!(fault.message, "G-code lock");
    assert!(fault.description.contains("locked out"));
}

#[test]
fn test_parse_error_unknown_code_has_empty_text() {
    let message = parse_line("error:117");
    let GrblMessageKind::Error(fault) = message.kind else {
        panic!("expected error, got {:?}", message.kind);
    };
    assert_eq!(fault.code, 117);
    assert_eq!(fault.message, "");
    assert_eq!(fault.description, "");
}

#[test]
fn test_parse_alarm_resolves_table() {
    let message = parse_line("ALARM:6");
    let GrblMessageKind::Alarm(fault) = message.kind else {
        panic!("expected alarm, got {:?}", message.kind);
    };
    assert_eq!(fault.code, 6);
    assert_eq!(fault.message, "Homing fail");
}

#[test]
fn test_parse_full_status_report() {
    let message =
        parse_line("<Idle|MPos:5.000,2.000,0.000|FS:0,0|Ov:100,100,100>");
    let GrblMessageKind::Status(report) = message.kind else {
        panic!("expected status, got {:?}", message.kind);
    };
    assert_eq!(report.state, MachineState::Idle);
    assert_eq!(report.mpos, Some(Position::new(5.0, 2.0, 0.0)));
    assert_eq!(report.feed_rate, Some(0.0));
    assert_eq!(report.spindle_speed, Some(0.0));
    let overrides = report.overrides.unwrap();
    assert_eq!(
        (overrides.feed, overrides.rapid, overrides.spindle),
        (100, 100, 100)
    );
}

#[test]
fn test_parse_status_substate_and_extras() {
    let message = parse_line("<Hold:1|WPos:1.000,2.000,3.000|Bf:15,128|Ln:42|Pn:XYZ|A:SFM>");
    let GrblMessageKind::Status(report) = message.kind else {
        panic!("expected status");
    };
    assert_eq!(report.state, MachineState::Hold);
    assert_eq!(report.substate, Some(1));
    assert_eq!(report.buffer.map(|b| (b.planner, b.rx)), Some((15, 128)));
    assert_eq!(report.line_number, Some(42));
    assert_eq!(report.pins.as_deref(), Some("XYZ"));
    assert_eq!(report.accessories.as_deref(), Some("SFM"));
}

#[test]
fn test_parse_status_unknown_state_preserved() {
    let message = parse_line("<Tool|MPos:0.000,0.000,0.000>");
    let GrblMessageKind::Status(report) = message.kind else {
        panic!("expected status");
    };
    assert_eq!(report.state, MachineState::Unknown("Tool".to_string()));
}

#[test]
fn test_parse_status_unknown_fields_ignored() {
    let message = parse_line("<Idle|MPos:1.000,1.000,1.000|Qz:9,9|MPg:x>");
    assert!(matches!(message.kind, GrblMessageKind::Status(_)));
}

#[test]
fn test_parse_parser_state() {
    let message = parse_line("[GC:G0 G54 G17 G21 G90 G94 M5 M9 T0 F0 S0]");
    let GrblMessageKind::ParserState(report) = message.kind else {
        panic!("expected parser state, got {:?}", message.kind);
    };
    assert_eq!(
        report.modal.get(&ModalGroup::Motion),
        Some(&vec!["G0".to_string()])
    );
    assert_eq!(
        report.modal.get(&ModalGroup::Units),
        Some(&vec!["G21".to_string()])
    );
    assert_eq!(report.tool, Some(0));
    assert_eq!(report.feed_rate, Some(0.0));
    assert_eq!(report.spindle_speed, Some(0.0));
}

#[test]
fn test_parse_parameters() {
    let message = parse_line("[G54:1.000,2.000,3.000]");
    let GrblMessageKind::Parameter { name, value } = message.kind else {
        panic!("expected parameter");
    };
    assert_eq!(name, "G54");
    assert_eq!(value, ParameterValue::Offset(Position::new(1.0, 2.0, 3.0)));

    let message = parse_line("[TLO:0.500]");
    let GrblMessageKind::Parameter { value, .. } = message.kind else {
        panic!("expected parameter");
    };
    assert_eq!(value, ParameterValue::ToolLengthOffset(0.5));

    let message = parse_line("[PRB:1.000,2.000,3.000:1]");
    let GrblMessageKind::Parameter { value, .. } = message.kind else {
        panic!("expected parameter");
    };
    assert_eq!(
        value,
        ParameterValue::Probe {
            position: Position::new(1.0, 2.0, 3.0),
            success: true,
        }
    );

    let message = parse_line("[PRB:0.000,0.000,0.000:0]");
    let GrblMessageKind::Parameter { value, .. } = message.kind else {
        panic!("expected parameter");
    };
    assert!(matches!(value, ParameterValue::Probe { success: false, .. }));
}

#[test]
fn test_parse_version_and_options() {
    let message = parse_line("[VER:1.1h.20190825:Some comment]");
    assert_eq!(
        message.kind,
        GrblMessageKind::Version {
            version: "1.1h.20190825".to_string(),
            comment: "Some comment".to_string(),
        }
    );

    let message = parse_line("[OPT:VNM+,35,255]");
    let GrblMessageKind::Options(options) = message.kind else {
        panic!("expected options");
    };
    assert_eq!(options.code, "VNM+");
    assert_eq!(options.block_buffer, Some(35));
    assert_eq!(options.rx_buffer, Some(255));
}

#[test]
fn test_parse_echo_help_feedback() {
    assert_eq!(
        parse_line("[echo:G1X1]").kind,
        GrblMessageKind::Echo {
            text: "G1X1".to_string()
        }
    );
    assert_eq!(
        parse_line("[HLP:$$ $# $G]").kind,
        GrblMessageKind::Help {
            text: "$$ $# $G".to_string()
        }
    );
    assert_eq!(
        parse_line("[MSG:Caution: Unlocked]").kind,
        GrblMessageKind::Feedback {
            text: "Caution: Unlocked".to_string()
        }
    );
    // A bracketed line matching nothing specific is generic feedback.
    assert_eq!(
        parse_line("[Reset to continue]").kind,
        GrblMessageKind::Feedback {
            text: "Reset to continue".to_string()
        }
    );
}

#[test]
fn test_parse_settings_and_startup_lines() {
    assert_eq!(
        parse_line("$10=255").kind,
        GrblMessageKind::Setting {
            name: "10".to_string(),
            value: "255".to_string(),
        }
    );
    assert_eq!(
        parse_line("$N0=G54").kind,
        GrblMessageKind::UserStartupLine {
            name: "N0".to_string(),
            value: "G54".to_string(),
        }
    );
}

#[test]
fn test_parse_startup_banner() {
    let message = parse_line("Grbl 1.1h ['$' for help]");
    let GrblMessageKind::Startup(banner) = message.kind else {
        panic!("expected startup, got {:?}", message.kind);
    };
    assert_eq!(banner.firmware, "Grbl");
    assert_eq!(banner.version, "1.1h");
    assert_eq!(banner.message, " ['$' for help]");

    // v0.9-era banners parse the same way.
    let message = parse_line("Grbl 0.9j ['$' for help]");
    assert!(matches!(message.kind, GrblMessageKind::Startup(_)));
}

#[test]
fn test_raw_line_retained_on_every_result() {
    for line in ["ok", "error:1", "<Idle>", "not a grbl line at all"] {
        assert_eq!(parse_line(line).raw, line);
    }
}

proptest! {
    // The dispatcher is total: any input yields exactly one message and
    // never panics.
    #[test]
    fn test_dispatcher_totality(line in ".*") {
        let message = parse_line(&line);
        prop_assert_eq!(message.raw, line);
    }

    #[test]
    fn test_dispatcher_totality_binary_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let line = String::from_utf8_lossy(&bytes).to_string();
        let _ = parse_line(&line);
    }
}
