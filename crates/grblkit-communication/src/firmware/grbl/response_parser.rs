//! GRBL response grammars and line dispatcher
//!
//! Each grammar is a pure function recognizing one message shape and
//! producing its typed payload. The dispatcher tries them in a fixed
//! priority order: some shapes are structural subsets of others (generic
//! bracket feedback would swallow `[VER:...]`, `[G54:...]` and friends), so
//! the specific bracket grammars run first. A line matching no grammar is
//! reported as [`GrblMessageKind::Unrecognized`], never an error: the
//! dispatcher is total over arbitrary input.

use grblkit_core::{MachineState, Position};
use std::collections::BTreeMap;

use super::messages::{
    BufferState, BuildOptions, GrblFault, GrblMessage, GrblMessageKind, ModalGroup, Overrides,
    ParameterValue, ParserStateReport, StartupBanner, StatusReport,
};

type Grammar = fn(&str) -> Option<GrblMessageKind>;

/// Grammars in priority order, highest first
const GRAMMARS: &[Grammar] = &[
    parse_status,
    parse_ok,
    parse_error,
    parse_alarm,
    parse_parser_state,
    parse_parameter,
    parse_help,
    parse_version,
    parse_options,
    parse_echo,
    parse_feedback,
    parse_user_startup_line,
    parse_setting,
    parse_startup,
];

/// Parse one line from the device into a typed message
///
/// Total: every input produces exactly one message, with the raw line
/// retained for audit logging.
pub fn parse_line(line: &str) -> GrblMessage {
    let trimmed = line.trim();
    for grammar in GRAMMARS {
        if let Some(kind) = grammar(trimmed) {
            return GrblMessage {
                raw: line.to_string(),
                kind,
            };
        }
    }
    GrblMessage {
        raw: line.to_string(),
        kind: GrblMessageKind::Unrecognized,
    }
}

/// Strip `[...]` framing
fn bracketed(line: &str) -> Option<&str> {
    if line.len() >= 2 && line.starts_with('[') && line.ends_with(']') {
        Some(&line[1..line.len() - 1])
    } else {
        None
    }
}

/// Parse a comma-separated coordinate triple, assigned positionally to x,y,z
fn parse_coords(value: &str) -> Option<Position> {
    let mut coords = value.split(',').map(|part| part.trim().parse::<f64>());
    let x = coords.next()?.ok()?;
    let y = coords.next()?.ok()?;
    let z = coords.next()?.ok()?;
    Some(Position::new(x, y, z))
}

/// `<State[:sub]|Key:v,v,...|...>` status report
fn parse_status(line: &str) -> Option<GrblMessageKind> {
    if !(line.len() >= 2 && line.starts_with('<') && line.ends_with('>')) {
        return None;
    }
    let inner = &line[1..line.len() - 1];
    let mut fields = inner.split('|');

    let head = fields.next()?;
    if head.is_empty() {
        return None;
    }
    let (state_name, substate) = match head.split_once(':') {
        Some((name, sub)) => (name, sub.trim().parse::<u8>().ok()),
        None => (head, None),
    };

    let mut report = StatusReport {
        state: MachineState::parse(state_name),
        substate,
        ..Default::default()
    };

    for field in fields {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        match key {
            "MPos" => report.mpos = parse_coords(value),
            "WPos" => report.wpos = parse_coords(value),
            "WCO" => report.wco = parse_coords(value),
            "Bf" => {
                let mut parts = value.split(',').map(|p| p.trim().parse::<u32>());
                if let (Some(Ok(planner)), Some(Ok(rx))) = (parts.next(), parts.next()) {
                    report.buffer = Some(BufferState { planner, rx });
                }
            }
            "Ln" => report.line_number = value.trim().parse().ok(),
            "F" => report.feed_rate = value.trim().parse().ok(),
            "FS" => {
                let mut parts = value.split(',').map(|p| p.trim().parse::<f64>());
                if let (Some(Ok(feed)), Some(Ok(spindle))) = (parts.next(), parts.next()) {
                    report.feed_rate = Some(feed);
                    report.spindle_speed = Some(spindle);
                }
            }
            "Pn" => report.pins = Some(value.to_string()),
            "Ov" => {
                let mut parts = value.split(',').map(|p| p.trim().parse::<u16>());
                if let (Some(Ok(feed)), Some(Ok(rapid)), Some(Ok(spindle))) =
                    (parts.next(), parts.next(), parts.next())
                {
                    report.overrides = Some(Overrides {
                        feed,
                        rapid,
                        spindle,
                    });
                }
            }
            "A" => report.accessories = Some(value.to_string()),
            // Unknown report fields are tolerated, not errors.
            _ => {}
        }
    }

    Some(GrblMessageKind::Status(report))
}

/// `ok` acknowledgment
fn parse_ok(line: &str) -> Option<GrblMessageKind> {
    (line == "ok").then_some(GrblMessageKind::Ok)
}

/// `error:N` response
fn parse_error(line: &str) -> Option<GrblMessageKind> {
    let code = line.strip_prefix("error:")?.trim().parse::<u8>().ok()?;
    Some(GrblMessageKind::Error(GrblFault::error(code)))
}

/// `ALARM:N` push message
fn parse_alarm(line: &str) -> Option<GrblMessageKind> {
    let code = line.strip_prefix("ALARM:")?.trim().parse::<u8>().ok()?;
    Some(GrblMessageKind::Alarm(GrblFault::alarm(code)))
}

/// Whether a token has the shape of a parser-state word (G0, M8, T2, F500, S1000)
fn is_state_word(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(letter) = chars.next() else {
        return false;
    };
    if !matches!(letter, 'G' | 'M' | 'T' | 'F' | 'S') {
        return false;
    }
    let rest = chars.as_str();
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// `[GC:G0 G54 ...]` parser state, or a bare bracketed word list (v0.9)
fn parse_parser_state(line: &str) -> Option<GrblMessageKind> {
    let inner = bracketed(line)?;
    let words = match inner.strip_prefix("GC:") {
        Some(rest) => rest,
        None => {
            // Without the GC: tag, only a line made entirely of state words
            // qualifies; anything else belongs to another bracket grammar.
            if inner.is_empty() || !inner.split_whitespace().all(is_state_word) {
                return None;
            }
            inner
        }
    };

    let mut report = ParserStateReport {
        modal: BTreeMap::new(),
        ..Default::default()
    };

    for token in words.split_whitespace() {
        if !is_state_word(token) {
            continue;
        }
        match token.as_bytes()[0] {
            b'T' => report.tool = token[1..].parse().ok(),
            b'F' => report.feed_rate = token[1..].parse().ok(),
            b'S' => report.spindle_speed = token[1..].parse().ok(),
            _ => {
                if let Some(group) = ModalGroup::classify(token) {
                    report.modal.entry(group).or_default().push(token.to_string());
                }
            }
        }
    }

    Some(GrblMessageKind::ParserState(report))
}

/// Names the parameter grammar recognizes with a coordinate payload
const OFFSET_PARAMETERS: &[&str] = &[
    "G54", "G55", "G56", "G57", "G58", "G59", "G28", "G30", "G92",
];

/// `[G54:...]`, `[TLO:...]`, `[PRB:...]` stored parameters
fn parse_parameter(line: &str) -> Option<GrblMessageKind> {
    let inner = bracketed(line)?;
    let (name, value) = inner.split_once(':')?;

    if OFFSET_PARAMETERS.contains(&name) {
        let position = parse_coords(value)?;
        return Some(GrblMessageKind::Parameter {
            name: name.to_string(),
            value: ParameterValue::Offset(position),
        });
    }

    if name == "TLO" {
        let offset = value.trim().parse::<f64>().ok()?;
        return Some(GrblMessageKind::Parameter {
            name: name.to_string(),
            value: ParameterValue::ToolLengthOffset(offset),
        });
    }

    if name == "PRB" {
        // PRB:x,y,z:flag — the trailing field is the probe success flag.
        let (coords, flag) = value.rsplit_once(':')?;
        let position = parse_coords(coords)?;
        return Some(GrblMessageKind::Parameter {
            name: name.to_string(),
            value: ParameterValue::Probe {
                position,
                success: flag.trim() == "1",
            },
        });
    }

    None
}

/// `[HLP:...]` help listing
fn parse_help(line: &str) -> Option<GrblMessageKind> {
    let text = bracketed(line)?.strip_prefix("HLP:")?;
    Some(GrblMessageKind::Help {
        text: text.to_string(),
    })
}

/// `[VER:version:comment]` build version
fn parse_version(line: &str) -> Option<GrblMessageKind> {
    let body = bracketed(line)?.strip_prefix("VER:")?;
    let (version, comment) = match body.split_once(':') {
        Some((version, comment)) => (version, comment),
        None => (body, ""),
    };
    Some(GrblMessageKind::Version {
        version: version.to_string(),
        comment: comment.to_string(),
    })
}

/// `[OPT:code,block_buffer,rx_buffer]` compile-time options
fn parse_options(line: &str) -> Option<GrblMessageKind> {
    let body = bracketed(line)?.strip_prefix("OPT:")?;
    let mut parts = body.split(',');
    let code = parts.next().unwrap_or_default().to_string();
    let block_buffer = parts.next().and_then(|p| p.trim().parse().ok());
    let rx_buffer = parts.next().and_then(|p| p.trim().parse().ok());
    Some(GrblMessageKind::Options(BuildOptions {
        code,
        block_buffer,
        rx_buffer,
    }))
}

/// `[echo:...]` echoed line
fn parse_echo(line: &str) -> Option<GrblMessageKind> {
    let text = bracketed(line)?.strip_prefix("echo:")?;
    Some(GrblMessageKind::Echo {
        text: text.to_string(),
    })
}

/// `[MSG:...]` or any remaining bracketed line
fn parse_feedback(line: &str) -> Option<GrblMessageKind> {
    let inner = bracketed(line)?;
    let text = inner.strip_prefix("MSG:").unwrap_or(inner);
    Some(GrblMessageKind::Feedback {
        text: text.to_string(),
    })
}

/// `$N0=G54` stored startup line
fn parse_user_startup_line(line: &str) -> Option<GrblMessageKind> {
    let body = line.strip_prefix("$N")?;
    let (index, value) = body.split_once('=')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(GrblMessageKind::UserStartupLine {
        name: format!("N{}", index),
        value: value.to_string(),
    })
}

/// `$10=255.5` setting listing entry
fn parse_setting(line: &str) -> Option<GrblMessageKind> {
    let body = line.strip_prefix('$')?;
    let (name, value) = body.split_once('=')?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(GrblMessageKind::Setting {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// `Grbl 1.1h ['$' for help]` startup banner
fn parse_startup(line: &str) -> Option<GrblMessageKind> {
    let (firmware, rest) = line.split_once(' ')?;
    if firmware.is_empty() || !firmware.chars().next().unwrap().is_ascii_alphabetic() {
        return None;
    }
    let (version, message_rest) = match rest.split_once(' ') {
        Some((version, message)) => (version, message),
        None => (rest, ""),
    };
    if !version.starts_with(|c: char| c.is_ascii_digit()) || !version.contains('.') {
        return None;
    }
    let message = if message_rest.is_empty() {
        String::new()
    } else {
        format!(" {}", message_rest)
    };
    Some(GrblMessageKind::Startup(StartupBanner {
        firmware: firmware.to_string(),
        version: version.to_string(),
        message,
    }))
}
