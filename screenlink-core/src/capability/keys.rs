//! Platform-neutral key names for `KEY_TAP` and the fixed chords used by
//! the command choreographies.

use std::fmt;
use std::str::FromStr;

use crate::error::InjectError;

/// A single key, independent of any OS key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Space,
    Escape,
    Tab,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function key `F1`..=`F12`.
    F(u8),
    Control,
    Alt,
    Shift,
    Meta,
    /// A printable character, typed as-is.
    Char(char),
}

impl Key {
    fn from_name(name: &str) -> Option<Key> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(Key::Char(c));
        }

        let lower = name.to_ascii_lowercase();
        let key = match lower.as_str() {
            "enter" | "return" => Key::Enter,
            "space" | "spacebar" => Key::Space,
            "escape" | "esc" => Key::Escape,
            "tab" => Key::Tab,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" | "pgup" | "page_up" => Key::PageUp,
            "pagedown" | "pgdn" | "page_down" => Key::PageDown,
            "ctrl" | "control" => Key::Control,
            "alt" | "option" => Key::Alt,
            "shift" => Key::Shift,
            "win" | "cmd" | "meta" | "super" => Key::Meta,
            other => {
                let n: u8 = other.strip_prefix('f')?.parse().ok()?;
                if (1..=12).contains(&n) {
                    Key::F(n)
                } else {
                    return None;
                }
            }
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::F(n) => write!(f, "F{n}"),
            Key::Char(c) => write!(f, "{c}"),
            other => write!(f, "{other:?}"),
        }
    }
}

// ── Keystroke ────────────────────────────────────────────────────

/// One key, or a chord pressed in order and released in reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystroke {
    keys: Vec<Key>,
}

impl Keystroke {
    pub fn single(key: Key) -> Self {
        Self { keys: vec![key] }
    }

    pub fn chord(keys: &[Key]) -> Self {
        Self {
            keys: keys.to_vec(),
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn is_chord(&self) -> bool {
        self.keys.len() > 1
    }
}

impl FromStr for Keystroke {
    type Err = InjectError;

    /// Parse `enter`, `F5`, `a`, or chords such as `ALT_ENTER` / `ctrl+c`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err(InjectError::UnknownKey(s.to_string()));
        }
        if let Some(key) = Key::from_name(name) {
            return Ok(Keystroke::single(key));
        }

        let keys = name
            .split(['+', '_'])
            .map(|part| Key::from_name(part.trim()))
            .collect::<Option<Vec<_>>>()
            .filter(|keys| keys.len() > 1)
            .ok_or_else(|| InjectError::UnknownKey(s.to_string()))?;
        Ok(Keystroke { keys })
    }
}

impl fmt::Display for Keystroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_are_case_insensitive() {
        assert_eq!("ENTER".parse::<Keystroke>().unwrap(), Keystroke::single(Key::Enter));
        assert_eq!("Esc".parse::<Keystroke>().unwrap(), Keystroke::single(Key::Escape));
        assert_eq!("f11".parse::<Keystroke>().unwrap(), Keystroke::single(Key::F(11)));
        assert_eq!("page_up".parse::<Keystroke>().unwrap(), Keystroke::single(Key::PageUp));
    }

    #[test]
    fn single_characters_are_typed_verbatim() {
        assert_eq!("y".parse::<Keystroke>().unwrap(), Keystroke::single(Key::Char('y')));
        assert_eq!("+".parse::<Keystroke>().unwrap(), Keystroke::single(Key::Char('+')));
    }

    #[test]
    fn chords_parse_in_order() {
        let ks: Keystroke = "ALT_ENTER".parse().unwrap();
        assert_eq!(ks.keys(), &[Key::Alt, Key::Enter]);
        assert!(ks.is_chord());

        let ks: Keystroke = "ctrl+shift+t".parse().unwrap();
        assert_eq!(ks.keys(), &[Key::Control, Key::Shift, Key::Char('t')]);
        assert_eq!(ks.to_string(), "Control+Shift+t");
    }

    #[test]
    fn unknown_names_are_rejected() {
        for bad in ["", "   ", "hyperdrive", "f13", "ctrl+nope"] {
            assert!(
                matches!(bad.parse::<Keystroke>(), Err(InjectError::UnknownKey(_))),
                "{bad:?}"
            );
        }
    }
}
