//! Structured input events delivered to components.

use crate::core::input::{parse_key, parse_key_event_type, parse_text, KeyEventType};

/// Input event delivered to the focused component.
///
/// `raw` is the exact byte chunk received from the terminal. `key_id` is the
/// canonical identifier for keybinding matching. Text and paste events carry
/// decoded text so widgets never parse escape sequences themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key {
        raw: String,
        key_id: String,
        event_type: KeyEventType,
    },
    Text {
        raw: String,
        text: String,
        event_type: KeyEventType,
    },
    Paste {
        raw: String,
        text: String,
    },
    Resize {
        columns: u16,
        rows: u16,
    },
    UnknownRaw {
        raw: String,
    },
}

/// Split an input chunk into events.
///
/// Bracketed-paste payloads become single `Paste` events and are never matched
/// against key identifiers. Everything else classifies as text, key, or
/// unknown raw bytes (passed through unchanged, per the total-decoding rule).
pub fn parse_input_events(data: &str, kitty_active: bool) -> Vec<InputEvent> {
    if data.is_empty() {
        return Vec::new();
    }

    const PASTE_START: &str = "\x1b[200~";
    const PASTE_END: &str = "\x1b[201~";

    fn parse_non_paste(data: &str, kitty_active: bool) -> Vec<InputEvent> {
        if data.is_empty() {
            return Vec::new();
        }

        let event_type = parse_key_event_type(data);

        if let Some(text) = parse_text(data, kitty_active) {
            if event_type == KeyEventType::Release {
                return Vec::new();
            }
            return vec![InputEvent::Text {
                raw: data.to_string(),
                text,
                event_type,
            }];
        }

        if let Some(key_id) = parse_key(data, kitty_active) {
            return vec![InputEvent::Key {
                raw: data.to_string(),
                key_id,
                event_type,
            }];
        }

        vec![InputEvent::UnknownRaw {
            raw: data.to_string(),
        }]
    }

    let mut events = Vec::new();
    let mut remaining = data;
    loop {
        let Some(start) = remaining.find(PASTE_START) else {
            events.extend(parse_non_paste(remaining, kitty_active));
            break;
        };

        let before = &remaining[..start];
        events.extend(parse_non_paste(before, kitty_active));

        let after_start = &remaining[start + PASTE_START.len()..];
        let Some(end_rel) = after_start.find(PASTE_END) else {
            events.push(InputEvent::UnknownRaw {
                raw: remaining.to_string(),
            });
            break;
        };

        let paste_text = &after_start[..end_rel];
        let raw_end = start + PASTE_START.len() + end_rel + PASTE_END.len();
        events.push(InputEvent::Paste {
            raw: remaining[start..raw_end].to_string(),
            text: paste_text.to_string(),
        });

        remaining = &after_start[end_rel + PASTE_END.len()..];
        if remaining.is_empty() {
            break;
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::{parse_input_events, InputEvent};
    use crate::core::input::KeyEventType;

    #[test]
    fn printable_utf8_is_text() {
        let events = parse_input_events("be", false);
        assert_eq!(
            events,
            vec![InputEvent::Text {
                raw: "be".to_string(),
                text: "be".to_string(),
                event_type: KeyEventType::Press,
            }]
        );
    }

    #[test]
    fn control_keys_become_key_events() {
        assert_eq!(
            parse_input_events("\r", false),
            vec![InputEvent::Key {
                raw: "\r".to_string(),
                key_id: "enter".to_string(),
                event_type: KeyEventType::Press,
            }]
        );
        assert_eq!(
            parse_input_events("\x1b[A", false),
            vec![InputEvent::Key {
                raw: "\x1b[A".to_string(),
                key_id: "up".to_string(),
                event_type: KeyEventType::Press,
            }]
        );
    }

    #[test]
    fn release_events_are_tagged() {
        let events = parse_input_events("\x1b[97;1:3u", true);
        assert_eq!(
            events,
            vec![InputEvent::Key {
                raw: "\x1b[97;1:3u".to_string(),
                key_id: "a".to_string(),
                event_type: KeyEventType::Release,
            }]
        );
    }

    #[test]
    fn bracketed_paste_can_be_mixed_with_keys() {
        let events = parse_input_events("a\x1b[200~b\x1b[201~c", false);
        assert_eq!(
            events,
            vec![
                InputEvent::Text {
                    raw: "a".to_string(),
                    text: "a".to_string(),
                    event_type: KeyEventType::Press,
                },
                InputEvent::Paste {
                    raw: "\x1b[200~b\x1b[201~".to_string(),
                    text: "b".to_string(),
                },
                InputEvent::Text {
                    raw: "c".to_string(),
                    text: "c".to_string(),
                    event_type: KeyEventType::Press,
                },
            ]
        );
    }

    #[test]
    fn unterminated_paste_is_passed_through_raw() {
        let events = parse_input_events("\x1b[200~half", false);
        assert_eq!(
            events,
            vec![InputEvent::UnknownRaw {
                raw: "\x1b[200~half".to_string(),
            }]
        );
    }

    #[test]
    fn unrecognized_sequences_pass_through() {
        let events = parse_input_events("\x1b[?25l", false);
        assert_eq!(
            events,
            vec![InputEvent::UnknownRaw {
                raw: "\x1b[?25l".to_string(),
            }]
        );
    }
}
