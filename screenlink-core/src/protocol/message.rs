//! Inbound commands and outbound messages.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::ProtocolError;

// ── Inbound ──────────────────────────────────────────────────────

/// Every `type` tag the agent understands.
pub const KNOWN_TYPES: &[&str] = &[
    "SWITCH_MONITOR",
    "SET_MONITOR",
    "MOUSE_CLICK",
    "MOUSE_MOVE",
    "INPUT_TEXT",
    "KEY_TAP",
    "TIMED_LOOP_START",
    "MACRO_LOOP_START",
    "AUTO_ACCEPT_START",
    "AUTO_ACCEPT_STOP",
    "RESTART_TERMINAL",
];

fn default_restart_command() -> String {
    "npm start".to_string()
}

/// Optional click target and text for a one-shot submit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoopRequest {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A decoded controller command. Coordinates are stream space.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    SwitchMonitor,
    SetMonitor {
        index: usize,
    },
    MouseClick {
        x: f64,
        y: f64,
    },
    MouseMove {
        x: f64,
        y: f64,
    },
    InputText {
        text: String,
        #[serde(rename = "dialogX", default)]
        dialog_x: Option<f64>,
        #[serde(rename = "dialogY", default)]
        dialog_y: Option<f64>,
    },
    KeyTap {
        key: String,
    },
    TimedLoopStart(LoopRequest),
    MacroLoopStart(LoopRequest),
    AutoAcceptStart,
    AutoAcceptStop,
    RestartTerminal {
        x: f64,
        y: f64,
        #[serde(default = "default_restart_command")]
        command: String,
    },
}

impl Command {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::SwitchMonitor => "SWITCH_MONITOR",
            Command::SetMonitor { .. } => "SET_MONITOR",
            Command::MouseClick { .. } => "MOUSE_CLICK",
            Command::MouseMove { .. } => "MOUSE_MOVE",
            Command::InputText { .. } => "INPUT_TEXT",
            Command::KeyTap { .. } => "KEY_TAP",
            Command::TimedLoopStart(_) => "TIMED_LOOP_START",
            Command::MacroLoopStart(_) => "MACRO_LOOP_START",
            Command::AutoAcceptStart => "AUTO_ACCEPT_START",
            Command::AutoAcceptStop => "AUTO_ACCEPT_STOP",
            Command::RestartTerminal { .. } => "RESTART_TERMINAL",
        }
    }
}

/// Decode one inbound line.
///
/// Unknown tags are classified before field decoding so that they can be
/// told apart from known commands with bad fields.
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let value: Value = serde_json::from_str(line).map_err(ProtocolError::InvalidJson)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !KNOWN_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }
    let kind = kind.to_string();
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidFields { kind, source })
}

// ── Outbound ─────────────────────────────────────────────────────

/// A message written to the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    /// One encoded frame; serialised as base64.
    Screen {
        #[serde(serialize_with = "as_base64")]
        data: Bytes,
    },
    Log {
        message: String,
    },
}

impl Outbound {
    pub fn log(message: impl Into<String>) -> Self {
        Outbound::Log {
            message: message.into(),
        }
    }

    pub fn screen(data: impl Into<Bytes>) -> Self {
        Outbound::Screen { data: data.into() }
    }
}

fn as_base64<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command_shape() {
        let cases = [
            (r#"{"type":"SWITCH_MONITOR"}"#, Command::SwitchMonitor),
            (r#"{"type":"SET_MONITOR","index":2}"#, Command::SetMonitor { index: 2 }),
            (
                r#"{"type":"MOUSE_CLICK","x":512,"y":288.5}"#,
                Command::MouseClick { x: 512.0, y: 288.5 },
            ),
            (r#"{"type":"KEY_TAP","key":"enter"}"#, Command::KeyTap { key: "enter".into() }),
            (r#"{"type":"AUTO_ACCEPT_START"}"#, Command::AutoAcceptStart),
            (r#"{"type":"AUTO_ACCEPT_STOP","extra":true}"#, Command::AutoAcceptStop),
        ];
        for (line, expected) in cases {
            assert_eq!(parse_command(line).unwrap(), expected, "{line}");
        }
    }

    #[test]
    fn input_text_dialog_position_is_optional() {
        let cmd = parse_command(r#"{"type":"INPUT_TEXT","text":"你好"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::InputText {
                text: "你好".into(),
                dialog_x: None,
                dialog_y: None
            }
        );

        let cmd =
            parse_command(r#"{"type":"INPUT_TEXT","text":"hi","dialogX":10,"dialogY":null}"#)
                .unwrap();
        assert!(matches!(
            cmd,
            Command::InputText {
                dialog_x: Some(x),
                dialog_y: None,
                ..
            } if x == 10.0
        ));
    }

    #[test]
    fn loop_aliases_share_a_payload() {
        let timed = parse_command(r#"{"type":"TIMED_LOOP_START","x":1,"y":2,"text":"go"}"#).unwrap();
        let macro_ = parse_command(r#"{"type":"MACRO_LOOP_START","x":1,"y":2,"text":"go"}"#).unwrap();
        let expected = LoopRequest {
            x: Some(1.0),
            y: Some(2.0),
            text: Some("go".into()),
        };
        assert_eq!(timed, Command::TimedLoopStart(expected.clone()));
        assert_eq!(macro_, Command::MacroLoopStart(expected));

        let bare = parse_command(r#"{"type":"MACRO_LOOP_START"}"#).unwrap();
        assert_eq!(bare, Command::MacroLoopStart(LoopRequest::default()));
    }

    #[test]
    fn restart_terminal_defaults_its_command() {
        let cmd = parse_command(r#"{"type":"RESTART_TERMINAL","x":3,"y":4}"#).unwrap();
        assert_eq!(
            cmd,
            Command::RestartTerminal {
                x: 3.0,
                y: 4.0,
                command: "npm start".into()
            }
        );
    }

    #[test]
    fn malformed_lines_are_classified() {
        assert!(matches!(parse_command("not json"), Err(ProtocolError::InvalidJson(_))));
        assert!(matches!(parse_command(r#"{"x":1}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(parse_command(r#"{"type":7}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(parse_command("[1,2]"), Err(ProtocolError::MissingType)));
        assert!(matches!(
            parse_command(r#"{"type":"LAUNCH_ROCKET"}"#),
            Err(ProtocolError::UnknownType(t)) if t == "LAUNCH_ROCKET"
        ));
        assert!(matches!(
            parse_command(r#"{"type":"MOUSE_CLICK","x":1}"#),
            Err(ProtocolError::InvalidFields { kind, .. }) if kind == "MOUSE_CLICK"
        ));
        assert!(matches!(
            parse_command(r#"{"type":"SET_MONITOR","index":-1}"#),
            Err(ProtocolError::InvalidFields { .. })
        ));
    }

    #[test]
    fn every_known_type_has_a_variant() {
        // Fieldless probes only fail on fields, never on the tag itself.
        for kind in KNOWN_TYPES {
            let line = format!(r#"{{"type":"{kind}"}}"#);
            match parse_command(&line) {
                Ok(cmd) => assert_eq!(cmd.kind(), *kind),
                Err(ProtocolError::InvalidFields { kind: k, .. }) => assert_eq!(k, *kind),
                Err(other) => panic!("{kind}: {other}"),
            }
        }
    }

    #[test]
    fn outbound_shapes() {
        let log = serde_json::to_string(&Outbound::log("hi")).unwrap();
        assert_eq!(log, r#"{"type":"log","message":"hi"}"#);

        let screen = serde_json::to_string(&Outbound::screen(vec![0xFF, 0xD8, 0xFF])).unwrap();
        assert_eq!(screen, r#"{"type":"screen","data":"/9j/"}"#);
    }
}
