//! Raw terminal input decoding.
//!
//! Turns escape-sequence byte chunks into canonical key identifiers such as
//! `"ctrl+shift+f5"`. Three generations of wire conventions are understood, in
//! priority order: the kitty keyboard protocol, xterm's `modifyOtherKeys`, and
//! the legacy per-modifier escape tables. Anything unrecognized decodes to
//! `None` and is passed through by the caller; decoding never fails.
//!
//! All entry points take `kitty_active` explicitly. The caller (normally the
//! runtime, which owns the kitty handshake) threads it through; there is no
//! process-wide protocol flag.

use std::collections::HashMap;

use once_cell::sync::Lazy;

const MOD_SHIFT: u8 = 1;
const MOD_ALT: u8 = 2;
const MOD_CTRL: u8 = 4;
// Caps-lock and num-lock report in the two high bits of the kitty modifier
// field and never participate in matching.
const LOCK_MASK: u8 = 64 + 128;

const CODEPOINT_ESCAPE: i32 = 27;
const CODEPOINT_TAB: i32 = 9;
const CODEPOINT_ENTER: i32 = 13;
const CODEPOINT_SPACE: i32 = 32;
const CODEPOINT_BACKSPACE: i32 = 127;
const CODEPOINT_KP_ENTER: i32 = 57414;

// Non-printable keys live in a reserved negative space so they can never
// collide with Unicode codepoints.
const ARROW_UP: i32 = -1;
const ARROW_DOWN: i32 = -2;
const ARROW_RIGHT: i32 = -3;
const ARROW_LEFT: i32 = -4;

const KEY_DELETE: i32 = -10;
const KEY_INSERT: i32 = -11;
const KEY_PAGE_UP: i32 = -12;
const KEY_PAGE_DOWN: i32 = -13;
const KEY_HOME: i32 = -14;
const KEY_END: i32 = -15;

const KEY_F1: i32 = -21;
const KEY_F12: i32 = -32;

// Kitty encodes the modifier keys themselves (left shift, right ctrl, ...) in
// this codepoint range. A chord with no base key must not match anything.
const KITTY_MODIFIER_KEY_MIN: i32 = 57441;
const KITTY_MODIFIER_KEY_MAX: i32 = 57454;

/// Press/repeat/release classification carried by kitty-protocol events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    Press,
    Repeat,
    Release,
}

/// Decoded kitty-protocol key sequence.
#[derive(Debug, Clone, Copy)]
pub struct ParsedKittySequence {
    pub codepoint: i32,
    pub shifted_key: Option<i32>,
    pub base_layout_key: Option<i32>,
    pub modifier: u8,
    pub event_type: KeyEventType,
}

/// Shifted-symbol layout for a US keyboard, used to resolve `shift+1` as `!`
/// and to decode shifted codepoints back to their base key.
static SHIFTED_OF: Lazy<HashMap<char, char>> = Lazy::new(|| {
    [
        ('1', '!'),
        ('2', '@'),
        ('3', '#'),
        ('4', '$'),
        ('5', '%'),
        ('6', '^'),
        ('7', '&'),
        ('8', '*'),
        ('9', '('),
        ('0', ')'),
        ('`', '~'),
        ('-', '_'),
        ('=', '+'),
        ('[', '{'),
        (']', '}'),
        ('\\', '|'),
        (';', ':'),
        ('\'', '"'),
        (',', '<'),
        ('.', '>'),
        ('/', '?'),
    ]
    .into_iter()
    .collect()
});

static UNSHIFTED_OF: Lazy<HashMap<char, char>> = Lazy::new(|| {
    SHIFTED_OF.iter().map(|(base, shifted)| (*shifted, *base)).collect()
});

type LegacyTable = &'static [(&'static str, &'static str)];

// One table per modifier combination. Every entry is a literal byte sequence
// mapped to a base key name.
static LEGACY_PLAIN: LegacyTable = &[
    ("\x1b[A", "up"),
    ("\x1bOA", "up"),
    ("\x1b[B", "down"),
    ("\x1bOB", "down"),
    ("\x1b[C", "right"),
    ("\x1bOC", "right"),
    ("\x1b[D", "left"),
    ("\x1bOD", "left"),
    ("\x1b[H", "home"),
    ("\x1bOH", "home"),
    ("\x1b[1~", "home"),
    ("\x1b[7~", "home"),
    ("\x1b[F", "end"),
    ("\x1bOF", "end"),
    ("\x1b[4~", "end"),
    ("\x1b[8~", "end"),
    ("\x1b[2~", "insert"),
    ("\x1b[3~", "delete"),
    ("\x1b[5~", "pageUp"),
    ("\x1b[[5~", "pageUp"),
    ("\x1b[6~", "pageDown"),
    ("\x1b[[6~", "pageDown"),
    ("\x1b[E", "clear"),
    ("\x1bOE", "clear"),
    ("\x1bOP", "f1"),
    ("\x1b[11~", "f1"),
    ("\x1b[[A", "f1"),
    ("\x1bOQ", "f2"),
    ("\x1b[12~", "f2"),
    ("\x1b[[B", "f2"),
    ("\x1bOR", "f3"),
    ("\x1b[13~", "f3"),
    ("\x1b[[C", "f3"),
    ("\x1bOS", "f4"),
    ("\x1b[14~", "f4"),
    ("\x1b[[D", "f4"),
    ("\x1b[15~", "f5"),
    ("\x1b[[E", "f5"),
    ("\x1b[17~", "f6"),
    ("\x1b[18~", "f7"),
    ("\x1b[19~", "f8"),
    ("\x1b[20~", "f9"),
    ("\x1b[21~", "f10"),
    ("\x1b[23~", "f11"),
    ("\x1b[24~", "f12"),
];

static LEGACY_SHIFT: LegacyTable = &[
    ("\x1b[Z", "tab"),
    ("\x1b[a", "up"),
    ("\x1b[b", "down"),
    ("\x1b[c", "right"),
    ("\x1b[d", "left"),
    ("\x1b[e", "clear"),
    ("\x1b[2$", "insert"),
    ("\x1b[3$", "delete"),
    ("\x1b[5$", "pageUp"),
    ("\x1b[6$", "pageDown"),
    ("\x1b[7$", "home"),
    ("\x1b[8$", "end"),
    ("\x1b[1;2A", "up"),
    ("\x1b[1;2B", "down"),
    ("\x1b[1;2C", "right"),
    ("\x1b[1;2D", "left"),
];

static LEGACY_CTRL: LegacyTable = &[
    ("\x1bOa", "up"),
    ("\x1bOb", "down"),
    ("\x1bOc", "right"),
    ("\x1bOd", "left"),
    ("\x1bOe", "clear"),
    ("\x1b[2^", "insert"),
    ("\x1b[3^", "delete"),
    ("\x1b[5^", "pageUp"),
    ("\x1b[6^", "pageDown"),
    ("\x1b[7^", "home"),
    ("\x1b[8^", "end"),
    ("\x1b[1;5A", "up"),
    ("\x1b[1;5B", "down"),
    ("\x1b[1;5C", "right"),
    ("\x1b[1;5D", "left"),
];

static LEGACY_ALT: LegacyTable = &[
    ("\x1bb", "left"),
    ("\x1bf", "right"),
    ("\x1bp", "up"),
    ("\x1bn", "down"),
    ("\x1b\x7f", "backspace"),
    ("\x1b\x08", "backspace"),
    ("\x1b[1;3A", "up"),
    ("\x1b[1;3B", "down"),
    ("\x1b[1;3C", "right"),
    ("\x1b[1;3D", "left"),
];

static LEGACY_CTRL_SHIFT: LegacyTable = &[
    ("\x1b[2@", "insert"),
    ("\x1b[3@", "delete"),
    ("\x1b[5@", "pageUp"),
    ("\x1b[6@", "pageDown"),
    ("\x1b[7@", "home"),
    ("\x1b[8@", "end"),
    ("\x1b[1;6A", "up"),
    ("\x1b[1;6B", "down"),
    ("\x1b[1;6C", "right"),
    ("\x1b[1;6D", "left"),
];

static LEGACY_CTRL_ALT: LegacyTable = &[
    ("\x1b[1;7A", "up"),
    ("\x1b[1;7B", "down"),
    ("\x1b[1;7C", "right"),
    ("\x1b[1;7D", "left"),
];

static LEGACY_SHIFT_ALT: LegacyTable = &[
    ("\x1b[1;4A", "up"),
    ("\x1b[1;4B", "down"),
    ("\x1b[1;4C", "right"),
    ("\x1b[1;4D", "left"),
];

static LEGACY_CTRL_SHIFT_ALT: LegacyTable = &[
    ("\x1b[1;8A", "up"),
    ("\x1b[1;8B", "down"),
    ("\x1b[1;8C", "right"),
    ("\x1b[1;8D", "left"),
];

fn legacy_table_for(modifier: u8) -> LegacyTable {
    match modifier {
        0 => LEGACY_PLAIN,
        MOD_SHIFT => LEGACY_SHIFT,
        MOD_CTRL => LEGACY_CTRL,
        MOD_ALT => LEGACY_ALT,
        m if m == MOD_CTRL + MOD_SHIFT => LEGACY_CTRL_SHIFT,
        m if m == MOD_CTRL + MOD_ALT => LEGACY_CTRL_ALT,
        m if m == MOD_SHIFT + MOD_ALT => LEGACY_SHIFT_ALT,
        m if m == MOD_CTRL + MOD_SHIFT + MOD_ALT => LEGACY_CTRL_SHIFT_ALT,
        _ => &[],
    }
}

fn legacy_lookup(data: &str, modifier: u8) -> Option<&'static str> {
    legacy_table_for(modifier)
        .iter()
        .find(|(seq, _)| *seq == data)
        .map(|(_, key)| *key)
}

fn legacy_identify(data: &str) -> Option<String> {
    const COMBOS: [u8; 8] = [
        0,
        MOD_SHIFT,
        MOD_CTRL,
        MOD_ALT,
        MOD_CTRL + MOD_SHIFT,
        MOD_CTRL + MOD_ALT,
        MOD_SHIFT + MOD_ALT,
        MOD_CTRL + MOD_SHIFT + MOD_ALT,
    ];
    for modifier in COMBOS {
        if let Some(key) = legacy_lookup(data, modifier) {
            return Some(prepend_modifiers(modifier, key));
        }
    }
    None
}

/// Canonical identifier prefix order: ctrl, shift, alt.
fn prepend_modifiers(modifier: u8, key: &str) -> String {
    let mut id = String::new();
    if modifier & MOD_CTRL != 0 {
        id.push_str("ctrl+");
    }
    if modifier & MOD_SHIFT != 0 {
        id.push_str("shift+");
    }
    if modifier & MOD_ALT != 0 {
        id.push_str("alt+");
    }
    id.push_str(key);
    id
}

/// True for the terminal's reply to the kitty keyboard-protocol query
/// (`CSI ? <flags> u`).
pub fn is_kitty_query_response(data: &str) -> bool {
    let Some(body) = data.strip_prefix("\x1b[?") else {
        return false;
    };
    let Some(flags) = body.strip_suffix('u') else {
        return false;
    };
    !flags.is_empty() && flags.bytes().all(|b| b.is_ascii_digit())
}

/// True when `data` carries a key-release event in any of the three kitty
/// shapes. Bracketed-paste payloads never classify as releases.
pub fn is_key_release(data: &str) -> bool {
    has_event_marker(data, 3)
}

/// True when `data` carries a key-repeat event.
pub fn is_key_repeat(data: &str) -> bool {
    has_event_marker(data, 2)
}

fn has_event_marker(data: &str, event: u8) -> bool {
    if data.contains("\x1b[200~") {
        return false;
    }
    // CSI..u, CSI..~, and arrow/home/end/F1-F4 letter forms all place the
    // event type after a colon, immediately before the final byte.
    const FINALS: [char; 12] = ['u', '~', 'A', 'B', 'C', 'D', 'H', 'F', 'P', 'Q', 'R', 'S'];
    let marker_digit = (b'0' + event) as char;
    let mut marker = String::with_capacity(3);
    marker.push(':');
    marker.push(marker_digit);
    FINALS.iter().any(|final_byte| {
        let mut pattern = marker.clone();
        pattern.push(*final_byte);
        data.contains(&pattern)
    })
}

/// Press/repeat/release classification for an input chunk.
pub fn parse_key_event_type(data: &str) -> KeyEventType {
    if is_key_release(data) {
        KeyEventType::Release
    } else if is_key_repeat(data) {
        KeyEventType::Repeat
    } else {
        KeyEventType::Press
    }
}

/// Printable text carried by `data`, if the chunk is text rather than a key
/// chord. Control bytes and escape sequences disqualify the whole chunk.
pub fn parse_text(data: &str, _kitty_active: bool) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    if data.chars().any(|ch| ch.is_control()) {
        return None;
    }
    Some(data.to_string())
}

fn parse_event_type(event_type: Option<&str>) -> KeyEventType {
    match event_type.and_then(|value| value.parse::<u8>().ok()) {
        Some(2) => KeyEventType::Repeat,
        Some(3) => KeyEventType::Release,
        _ => KeyEventType::Press,
    }
}

fn parse_modifier_field(field: &str) -> (u8, KeyEventType) {
    let (mod_value, event_value) = match field.split_once(':') {
        Some((left, right)) => (left, Some(right)),
        None => (field, None),
    };
    let mod_value = mod_value.parse::<u8>().unwrap_or(1);
    (mod_value.saturating_sub(1), parse_event_type(event_value))
}

fn functional_codepoint(key_num: i32) -> Option<i32> {
    match key_num {
        2 => Some(KEY_INSERT),
        3 => Some(KEY_DELETE),
        5 => Some(KEY_PAGE_UP),
        6 => Some(KEY_PAGE_DOWN),
        7 => Some(KEY_HOME),
        8 => Some(KEY_END),
        11..=15 => Some(KEY_F1 - (key_num - 11)),
        17..=21 => Some(KEY_F1 - 5 - (key_num - 17)),
        23 | 24 => Some(KEY_F1 - 10 - (key_num - 23)),
        _ => None,
    }
}

/// Parse one of the kitty protocol shapes, if `data` is exactly one sequence.
///
/// Shapes: generic `CSI cp[:shifted[:base]][;mod[:event]]u`, functional
/// `CSI n[;mod[:event]]~`, and the arrow/home/end/F1-F4 letter form
/// `CSI 1;mod[:event]X`.
pub fn parse_kitty_sequence(data: &str) -> Option<ParsedKittySequence> {
    let stripped = data.strip_prefix("\x1b[")?;

    if let Some(body) = stripped.strip_suffix('u') {
        let (code_part, mod_part) = match body.split_once(';') {
            Some((left, right)) => (left, Some(right)),
            None => (body, None),
        };

        let mut code_iter = code_part.split(':');
        let codepoint = code_iter.next()?.parse::<i32>().ok()?;
        let shifted = code_iter.next();
        let base = code_iter.next();
        if code_iter.next().is_some() {
            return None;
        }

        let shifted_key =
            shifted.and_then(|value| if value.is_empty() { None } else { value.parse().ok() });
        let base_layout_key = base.and_then(|value| value.parse().ok());

        let (modifier, event_type) = match mod_part {
            Some(mod_part) => parse_modifier_field(mod_part),
            None => (0, KeyEventType::Press),
        };

        return Some(ParsedKittySequence {
            codepoint,
            shifted_key,
            base_layout_key,
            modifier,
            event_type,
        });
    }

    if let Some(body) = stripped.strip_suffix('~') {
        let mut parts = body.split(';');
        let num_part = parts.next()?;
        let mod_part = parts.next();
        if parts.next().is_some() {
            return None;
        }
        let key_num = num_part.parse::<i32>().ok()?;
        let codepoint = functional_codepoint(key_num)?;
        let (modifier, event_type) = match mod_part {
            Some(mod_part) => parse_modifier_field(mod_part),
            None => (0, KeyEventType::Press),
        };

        return Some(ParsedKittySequence {
            codepoint,
            shifted_key: None,
            base_layout_key: None,
            modifier,
            event_type,
        });
    }

    if let Some(stripped) = stripped.strip_prefix("1;") {
        if stripped.len() >= 2 {
            let (mod_part, tail) = stripped.split_at(stripped.len() - 1);
            let final_char = tail.chars().next()?;
            let codepoint = match final_char {
                'A' => ARROW_UP,
                'B' => ARROW_DOWN,
                'C' => ARROW_RIGHT,
                'D' => ARROW_LEFT,
                'H' => KEY_HOME,
                'F' => KEY_END,
                'P' => KEY_F1,
                'Q' => KEY_F1 - 1,
                'R' => KEY_F1 - 2,
                'S' => KEY_F1 - 3,
                _ => return None,
            };
            let (modifier, event_type) = parse_modifier_field(mod_part);

            return Some(ParsedKittySequence {
                codepoint,
                shifted_key: None,
                base_layout_key: None,
                modifier,
                event_type,
            });
        }
    }

    None
}

fn matches_kitty_sequence(data: &str, expected_codepoint: i32, expected_modifier: u8) -> bool {
    let Some(parsed) = parse_kitty_sequence(data) else {
        return false;
    };

    let actual_mod = parsed.modifier & !LOCK_MASK;
    let expected_mod = expected_modifier & !LOCK_MASK;
    if actual_mod != expected_mod {
        return false;
    }

    if parsed.codepoint == expected_codepoint {
        return true;
    }

    // A shifted codepoint in the payload wins over the base one when Shift is
    // held.
    if actual_mod & MOD_SHIFT != 0 && parsed.shifted_key == Some(expected_codepoint) {
        return true;
    }

    // Non-latin layouts report the physical key in the base-layout slot; only
    // fall back to it when the pressed codepoint is not itself a known key.
    if parsed.base_layout_key == Some(expected_codepoint) {
        let cp = parsed.codepoint;
        let is_latin_letter = (97..=122).contains(&cp);
        let is_known_symbol =
            (0..=127).contains(&cp) && is_symbol_key(cp as u8 as char);
        if !is_latin_letter && !is_known_symbol {
            return true;
        }
    }

    false
}

fn matches_modify_other_keys(data: &str, expected_keycode: i32, expected_modifier: u8) -> bool {
    let Some(body) = data.strip_prefix("\x1b[27;") else {
        return false;
    };
    let Some(body) = body.strip_suffix('~') else {
        return false;
    };

    let mut parts = body.split(';');
    let Some(mod_part) = parts.next() else {
        return false;
    };
    let Some(key_part) = parts.next() else {
        return false;
    };
    if parts.next().is_some() {
        return false;
    }

    let Ok(mod_value) = mod_part.parse::<u8>() else {
        return false;
    };
    let Ok(keycode) = key_part.parse::<i32>() else {
        return false;
    };
    let actual_mod = mod_value.saturating_sub(1) & !LOCK_MASK;

    keycode == expected_keycode && actual_mod == expected_modifier
}

fn parse_modify_other_keys(data: &str) -> Option<(u8, i32)> {
    let body = data.strip_prefix("\x1b[27;")?;
    let body = body.strip_suffix('~')?;
    let mut parts = body.split(';');
    let mod_part = parts.next()?;
    let key_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let mod_value = mod_part.parse::<u8>().ok()?;
    let keycode = key_part.parse::<i32>().ok()?;
    Some((mod_value.saturating_sub(1) & !LOCK_MASK, keycode))
}

fn named_key_for_codepoint(codepoint: i32) -> Option<&'static str> {
    match codepoint {
        CODEPOINT_ESCAPE => Some("escape"),
        CODEPOINT_TAB => Some("tab"),
        CODEPOINT_ENTER | CODEPOINT_KP_ENTER => Some("enter"),
        CODEPOINT_SPACE => Some("space"),
        CODEPOINT_BACKSPACE => Some("backspace"),
        KEY_DELETE => Some("delete"),
        KEY_INSERT => Some("insert"),
        KEY_HOME => Some("home"),
        KEY_END => Some("end"),
        KEY_PAGE_UP => Some("pageUp"),
        KEY_PAGE_DOWN => Some("pageDown"),
        ARROW_UP => Some("up"),
        ARROW_DOWN => Some("down"),
        ARROW_LEFT => Some("left"),
        ARROW_RIGHT => Some("right"),
        cp if (KEY_F12..=KEY_F1).contains(&cp) => {
            const NAMES: [&str; 12] = [
                "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
            ];
            Some(NAMES[(KEY_F1 - cp) as usize])
        }
        _ => None,
    }
}

/// Decode `data` into a canonical key identifier, or `None` when the chunk is
/// not a single recognizable key chord.
pub fn parse_key(data: &str, kitty_active: bool) -> Option<String> {
    if let Some(kitty) = parse_kitty_sequence(data) {
        if let Some(id) = kitty_key_id(&kitty) {
            return Some(id);
        }
        // A recognized kitty sequence that names no key (for example a bare
        // modifier key) must not fall through to the byte-wise paths.
        return None;
    }

    if let Some((modifier, keycode)) = parse_modify_other_keys(data) {
        let key = named_key_for_codepoint(keycode).map(str::to_string).or_else(|| {
            if (32..=126).contains(&keycode) {
                Some(((keycode as u8) as char).to_string())
            } else {
                None
            }
        })?;
        return Some(prepend_modifiers(modifier, &key));
    }

    if kitty_active && (data == "\x1b\r" || data == "\n") {
        return Some("shift+enter".to_string());
    }

    if let Some(key_id) = legacy_identify(data) {
        return Some(key_id);
    }

    match data {
        "\x1b" => return Some("escape".to_string()),
        "\x1c" => return Some("ctrl+\\".to_string()),
        "\x1d" => return Some("ctrl+]".to_string()),
        "\x1f" => return Some("ctrl+-".to_string()),
        "\x1b\x1b" => return Some("ctrl+alt+[".to_string()),
        "\x1b\x1c" => return Some("ctrl+alt+\\".to_string()),
        "\x1b\x1d" => return Some("ctrl+alt+]".to_string()),
        "\x1b\x1f" => return Some("ctrl+alt+-".to_string()),
        "\t" => return Some("tab".to_string()),
        "\x00" => return Some("ctrl+space".to_string()),
        " " => return Some("space".to_string()),
        "\x7f" | "\x08" => return Some("backspace".to_string()),
        "\x1bOM" | "\r" => return Some("enter".to_string()),
        _ => {}
    }

    if !kitty_active {
        match data {
            "\n" => return Some("enter".to_string()),
            "\x1b\r" => return Some("alt+enter".to_string()),
            "\x1b " => return Some("alt+space".to_string()),
            "\x1bB" => return Some("alt+left".to_string()),
            "\x1bF" => return Some("alt+right".to_string()),
            _ => {}
        }
    }

    if !kitty_active && data.len() == 2 && data.starts_with('\x1b') {
        let code = data.as_bytes()[1];
        if (1..=26).contains(&code) {
            let ch = (code + 96) as char;
            return Some(format!("ctrl+alt+{}", ch));
        }
        if (97..=122).contains(&code) {
            let ch = code as char;
            return Some(format!("alt+{}", ch));
        }
    }

    if data.len() == 1 {
        let code = data.as_bytes()[0];
        if (1..=26).contains(&code) {
            let ch = (code + 96) as char;
            return Some(format!("ctrl+{}", ch));
        }
        if code.is_ascii_uppercase() {
            return Some(format!("shift+{}", (code as char).to_ascii_lowercase()));
        }
        if (32..=126).contains(&code) {
            return Some(data.to_string());
        }
    }

    None
}

fn kitty_key_id(kitty: &ParsedKittySequence) -> Option<String> {
    let mut modifier = kitty.modifier & !LOCK_MASK;
    let codepoint = kitty.codepoint;

    if (KITTY_MODIFIER_KEY_MIN..=KITTY_MODIFIER_KEY_MAX).contains(&codepoint) {
        return None;
    }

    // With Shift held, a shifted codepoint in the payload resolves the key:
    // shift+1 reports as `!` and the identifier is the symbol itself.
    if modifier & MOD_SHIFT != 0 {
        if let Some(shifted) = kitty.shifted_key {
            if (33..=126).contains(&shifted) {
                let ch = (shifted as u8) as char;
                if UNSHIFTED_OF.contains_key(&ch) {
                    modifier &= !MOD_SHIFT;
                    return Some(prepend_modifiers(modifier, &ch.to_string()));
                }
            }
        }
    }

    let is_latin_letter = (97..=122).contains(&codepoint);
    let is_known_symbol = (0..=127).contains(&codepoint) && is_symbol_key(codepoint as u8 as char);
    let effective_codepoint = if is_latin_letter || is_known_symbol {
        codepoint
    } else {
        kitty.base_layout_key.unwrap_or(codepoint)
    };

    let key_name: Option<String> = named_key_for_codepoint(effective_codepoint)
        .map(str::to_string)
        .or_else(|| {
            if (97..=122).contains(&effective_codepoint)
                || ((0..=127).contains(&effective_codepoint)
                    && is_symbol_key(effective_codepoint as u8 as char))
                || (48..=57).contains(&effective_codepoint)
            {
                Some(((effective_codepoint as u8) as char).to_string())
            } else {
                None
            }
        });

    key_name.map(|name| prepend_modifiers(modifier, &name))
}

/// Does `data` encode exactly the key chord named by `key_id`?
///
/// A true result for one identifier is exclusive: the same data never matches
/// a different chord.
pub fn matches_key(data: &str, key_id: &str, kitty_active: bool) -> bool {
    let Some(parsed) = parse_key_id(key_id) else {
        return false;
    };

    let modifier = parsed.modifier();

    match parsed.key.as_str() {
        "escape" | "esc" => {
            if modifier != 0 {
                return false;
            }
            data == "\x1b" || matches_kitty_sequence(data, CODEPOINT_ESCAPE, 0)
        }
        "space" => {
            if !kitty_active {
                if parsed.ctrl && !parsed.alt && !parsed.shift && data == "\x00" {
                    return true;
                }
                if parsed.alt && !parsed.ctrl && !parsed.shift && data == "\x1b " {
                    return true;
                }
            }
            if modifier == 0 {
                return data == " " || matches_kitty_sequence(data, CODEPOINT_SPACE, 0);
            }
            matches_kitty_sequence(data, CODEPOINT_SPACE, modifier)
        }
        "tab" => {
            if parsed.shift && !parsed.ctrl && !parsed.alt {
                return data == "\x1b[Z" || matches_kitty_sequence(data, CODEPOINT_TAB, MOD_SHIFT);
            }
            if modifier == 0 {
                return data == "\t" || matches_kitty_sequence(data, CODEPOINT_TAB, 0);
            }
            matches_kitty_sequence(data, CODEPOINT_TAB, modifier)
        }
        "enter" | "return" => {
            if parsed.shift && !parsed.ctrl && !parsed.alt {
                if matches_kitty_sequence(data, CODEPOINT_ENTER, MOD_SHIFT)
                    || matches_kitty_sequence(data, CODEPOINT_KP_ENTER, MOD_SHIFT)
                {
                    return true;
                }
                if matches_modify_other_keys(data, CODEPOINT_ENTER, MOD_SHIFT) {
                    return true;
                }
                if kitty_active {
                    return data == "\x1b\r" || data == "\n";
                }
                return false;
            }
            if parsed.alt && !parsed.ctrl && !parsed.shift {
                if matches_kitty_sequence(data, CODEPOINT_ENTER, MOD_ALT)
                    || matches_kitty_sequence(data, CODEPOINT_KP_ENTER, MOD_ALT)
                {
                    return true;
                }
                if matches_modify_other_keys(data, CODEPOINT_ENTER, MOD_ALT) {
                    return true;
                }
                if !kitty_active {
                    return data == "\x1b\r";
                }
                return false;
            }
            if modifier == 0 {
                return data == "\r"
                    || (!kitty_active && data == "\n")
                    || data == "\x1bOM"
                    || matches_kitty_sequence(data, CODEPOINT_ENTER, 0)
                    || matches_kitty_sequence(data, CODEPOINT_KP_ENTER, 0);
            }
            matches_kitty_sequence(data, CODEPOINT_ENTER, modifier)
                || matches_kitty_sequence(data, CODEPOINT_KP_ENTER, modifier)
        }
        "backspace" => {
            if parsed.alt && !parsed.ctrl && !parsed.shift {
                if data == "\x1b\x7f" || data == "\x1b\x08" {
                    return true;
                }
                return matches_kitty_sequence(data, CODEPOINT_BACKSPACE, MOD_ALT);
            }
            if modifier == 0 {
                return data == "\x7f"
                    || data == "\x08"
                    || matches_kitty_sequence(data, CODEPOINT_BACKSPACE, 0);
            }
            matches_kitty_sequence(data, CODEPOINT_BACKSPACE, modifier)
        }
        "up" | "down" | "left" | "right" | "home" | "end" | "insert" | "delete" | "pageup"
        | "pagedown" | "clear" => {
            let codepoint = match parsed.key.as_str() {
                "up" => ARROW_UP,
                "down" => ARROW_DOWN,
                "left" => ARROW_LEFT,
                "right" => ARROW_RIGHT,
                "home" => KEY_HOME,
                "end" => KEY_END,
                "insert" => KEY_INSERT,
                "delete" => KEY_DELETE,
                "pageup" => KEY_PAGE_UP,
                "pagedown" => KEY_PAGE_DOWN,
                _ => 0,
            };
            let table_key = match parsed.key.as_str() {
                "pageup" => "pageUp",
                "pagedown" => "pageDown",
                other => other,
            };
            if legacy_lookup(data, modifier) == Some(table_key) {
                return true;
            }
            if parsed.alt && !parsed.ctrl && !parsed.shift && !kitty_active {
                // Terminals without the kitty protocol send ESC B / ESC F for
                // alt+arrow on some configurations.
                if (parsed.key == "left" && data == "\x1bB")
                    || (parsed.key == "right" && data == "\x1bF")
                {
                    return true;
                }
            }
            if codepoint == 0 {
                // "clear" has no kitty codepoint; only the legacy tables carry it.
                return false;
            }
            matches_kitty_sequence(data, codepoint, modifier)
        }
        "f1" | "f2" | "f3" | "f4" | "f5" | "f6" | "f7" | "f8" | "f9" | "f10" | "f11" | "f12" => {
            let index = parsed.key[1..].parse::<i32>().unwrap_or(1) - 1;
            let codepoint = KEY_F1 - index;
            if modifier == 0 && legacy_lookup(data, 0) == Some(parsed.key.as_str()) {
                return true;
            }
            matches_kitty_sequence(data, codepoint, modifier)
        }
        _ => {
            let Some(ch) = parsed.single_char() else {
                return false;
            };
            if !is_letter(ch) && !is_symbol_key(ch) && !ch.is_ascii_digit() {
                return false;
            }

            let codepoint = ch as i32;
            let raw_ctrl = raw_ctrl_char(ch);

            if parsed.ctrl && parsed.alt && !parsed.shift && !kitty_active {
                if let Some(raw_ctrl) = raw_ctrl {
                    if data == format!("\x1b{}", raw_ctrl) {
                        return true;
                    }
                }
            }

            if parsed.alt && !parsed.ctrl && !parsed.shift && !kitty_active && is_letter(ch) {
                if data == format!("\x1b{}", ch) {
                    return true;
                }
            }

            if parsed.ctrl && !parsed.shift && !parsed.alt {
                if let Some(raw_ctrl) = raw_ctrl {
                    if data == raw_ctrl.to_string() {
                        return true;
                    }
                }
                return matches_kitty_sequence(data, codepoint, MOD_CTRL);
            }

            if parsed.shift && !parsed.ctrl && !parsed.alt {
                if is_letter(ch) && data == ch.to_ascii_uppercase().to_string() {
                    return true;
                }
                if let Some(shifted) = SHIFTED_OF.get(&ch) {
                    if data == shifted.to_string() {
                        return true;
                    }
                    if matches_kitty_sequence(data, *shifted as i32, MOD_SHIFT)
                        || matches_kitty_sequence(data, *shifted as i32, 0)
                    {
                        return true;
                    }
                }
                return matches_kitty_sequence(data, codepoint, MOD_SHIFT);
            }

            if modifier != 0 {
                if matches_modify_other_keys(data, codepoint, modifier) {
                    return true;
                }
                return matches_kitty_sequence(data, codepoint, modifier);
            }

            if data == ch.to_string() || matches_kitty_sequence(data, codepoint, 0) {
                return true;
            }
            // A shifted symbol queried by its own name ("!") also matches the
            // shift+base wire form the terminal actually sends.
            if UNSHIFTED_OF.contains_key(&ch) {
                return matches_kitty_sequence(data, codepoint, MOD_SHIFT);
            }
            false
        }
    }
}

struct ParsedKeyId {
    key: String,
    ctrl: bool,
    shift: bool,
    alt: bool,
}

impl ParsedKeyId {
    fn modifier(&self) -> u8 {
        let mut modifier = 0;
        if self.shift {
            modifier |= MOD_SHIFT;
        }
        if self.alt {
            modifier |= MOD_ALT;
        }
        if self.ctrl {
            modifier |= MOD_CTRL;
        }
        modifier
    }

    fn single_char(&self) -> Option<char> {
        let mut chars = self.key.chars();
        let ch = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Some(ch)
    }
}

fn parse_key_id(key_id: &str) -> Option<ParsedKeyId> {
    let lowered = key_id.to_lowercase();
    let parts: Vec<&str> = lowered.split('+').collect();
    let key = parts.last()?.to_string();
    if key.is_empty() {
        return None;
    }
    Some(ParsedKeyId {
        key,
        ctrl: parts.iter().any(|part| *part == "ctrl"),
        shift: parts.iter().any(|part| *part == "shift"),
        alt: parts.iter().any(|part| *part == "alt"),
    })
}

fn raw_ctrl_char(key: char) -> Option<char> {
    let lower = key.to_ascii_lowercase();
    if is_letter(lower) || matches!(lower, '[' | '\\' | ']' | '_') {
        let code = lower as u8;
        return Some((code & 0x1f) as char);
    }
    if lower == '-' {
        return Some(31 as char);
    }
    None
}

fn is_letter(ch: char) -> bool {
    ch.is_ascii_lowercase()
}

fn is_symbol_key(ch: char) -> bool {
    matches!(
        ch,
        '`' | '-' | '=' | '[' | ']' | '\\' | ';' | '\'' | '"' | ',' | '.' | '/' | '!' | '@'
            | '#' | '$' | '%' | '^' | '&' | '*' | '(' | ')' | '_' | '+' | '|' | '~' | '{'
            | '}' | ':' | '<' | '>' | '?'
    )
}

#[cfg(test)]
mod tests {
    use super::{
        is_key_release, is_key_repeat, is_kitty_query_response, matches_key, parse_key,
        parse_key_event_type, parse_kitty_sequence, parse_text, KeyEventType,
    };

    #[test]
    fn printable_ascii_round_trips() {
        for byte in 0x21..=0x7eu8 {
            let ch = byte as char;
            if ch.is_ascii_uppercase() {
                continue;
            }
            let data = ch.to_string();
            assert_eq!(parse_key(&data, false), Some(data.clone()), "{ch:?}");
            assert!(matches_key(&data, &data, false), "{ch:?}");
        }
    }

    #[test]
    fn uppercase_letters_decode_as_shift() {
        assert_eq!(parse_key("A", false), Some("shift+a".to_string()));
        assert!(matches_key("A", "shift+a", false));
    }

    #[test]
    fn ctrl_letters_from_control_bytes() {
        assert_eq!(parse_key("\x01", false), Some("ctrl+a".to_string()));
        assert_eq!(parse_key("\x1a", false), Some("ctrl+z".to_string()));
        assert!(matches_key("\x03", "ctrl+c", false));
    }

    #[test]
    fn alt_prefixed_bytes() {
        assert_eq!(parse_key("\x1bx", false), Some("alt+x".to_string()));
        assert_eq!(parse_key("\x1b\x01", false), Some("ctrl+alt+a".to_string()));
    }

    #[test]
    fn kitty_ctrl_a_matches_exclusively() {
        let data = "\x1b[97;5u";
        assert!(matches_key(data, "ctrl+a", true));
        assert!(!matches_key(data, "ctrl+b", true));
        assert!(!matches_key(data, "a", true));
        assert!(!matches_key(data, "ctrl+shift+a", true));
        assert_eq!(parse_key(data, true), Some("ctrl+a".to_string()));
    }

    #[test]
    fn canonical_modifier_order_is_ctrl_shift_alt() {
        assert_eq!(parse_key("\x1b[97;8u", true), Some("ctrl+shift+alt+a".to_string()));
    }

    #[test]
    fn lock_bits_are_masked() {
        // Modifier 69 = 1 + 4 (ctrl) + 64 (caps lock).
        assert!(matches_key("\x1b[97;69u", "ctrl+a", true));
    }

    #[test]
    fn shifted_symbol_table_resolves() {
        assert_eq!(parse_key("\x1b[49:33;2u", true), Some("!".to_string()));
        assert!(matches_key("!", "shift+1", false));
        assert!(matches_key("\x1b[49:33;2u", "shift+1", true));
    }

    #[test]
    fn functional_form_decodes_f_keys() {
        assert_eq!(parse_key("\x1b[15~", false), Some("f5".to_string()));
        assert_eq!(parse_key("\x1b[15;5~", false), Some("ctrl+f5".to_string()));
        assert_eq!(parse_key("\x1b[15;6~", false), Some("ctrl+shift+f5".to_string()));
        assert!(matches_key("\x1b[15;6~", "ctrl+shift+f5", false));
        assert_eq!(parse_key("\x1b[24~", false), Some("f12".to_string()));
    }

    #[test]
    fn arrow_form_with_modifiers() {
        assert_eq!(parse_key("\x1b[1;5D", false), Some("ctrl+left".to_string()));
        assert!(matches_key("\x1b[1;5D", "ctrl+left", false));
        assert!(matches_key("\x1b[1;2P", "shift+f1", false));
    }

    #[test]
    fn legacy_tables_are_exclusive() {
        let cases: [(&str, &str); 6] = [
            ("\x1b[A", "up"),
            ("\x1b[a", "shift+up"),
            ("\x1bOa", "ctrl+up"),
            ("\x1b[3$", "shift+delete"),
            ("\x1b[3^", "ctrl+delete"),
            ("\x1b[2@", "ctrl+shift+insert"),
        ];
        let all_ids = [
            "up", "down", "left", "right", "home", "end", "insert", "delete", "pageup",
            "pagedown", "shift+up", "ctrl+up", "shift+delete", "ctrl+delete",
            "ctrl+shift+insert",
        ];
        for (data, expected) in cases {
            assert_eq!(parse_key(data, false), Some(expected.to_string()), "{data:?}");
            for id in all_ids {
                let should_match = id.eq_ignore_ascii_case(expected);
                assert_eq!(
                    matches_key(data, id, false),
                    should_match,
                    "{data:?} vs {id}"
                );
            }
        }
    }

    #[test]
    fn modify_other_keys_form() {
        assert!(matches_key("\x1b[27;2;13~", "shift+enter", false));
        assert_eq!(parse_key("\x1b[27;5;13~", false), Some("ctrl+enter".to_string()));
    }

    #[test]
    fn base_layout_fallback_for_non_latin_only() {
        assert_eq!(parse_key("\x1b[1089::99;5u", true), Some("ctrl+c".to_string()));
        assert_eq!(parse_key("\x1b[99::118;5u", true), Some("ctrl+c".to_string()));
    }

    #[test]
    fn kitty_modifier_key_alone_is_rejected() {
        assert_eq!(parse_key("\x1b[57441;2u", true), None);
    }

    #[test]
    fn shift_enter_depends_on_kitty_mode() {
        assert_eq!(parse_key("\x1b\r", true), Some("shift+enter".to_string()));
        assert_eq!(parse_key("\n", true), Some("shift+enter".to_string()));
        assert_eq!(parse_key("\x1b\r", false), Some("alt+enter".to_string()));
        assert_eq!(parse_key("\n", false), Some("enter".to_string()));
    }

    #[test]
    fn release_and_repeat_classification() {
        assert!(is_key_release("\x1b[65;1:3u"));
        assert!(is_key_repeat("\x1b[65;1:2u"));
        assert!(is_key_release("\x1b[1;1:3A"));
        assert!(is_key_release("\x1b[3;1:3~"));
        assert!(!is_key_release("\x1b[65;1u"));
        assert_eq!(parse_key_event_type("\x1b[65;1:2u"), KeyEventType::Repeat);
        assert_eq!(parse_key_event_type("a"), KeyEventType::Press);
    }

    #[test]
    fn paste_payload_never_classifies_as_release() {
        assert!(!is_key_release("\x1b[200~90:62:3F\x1b[201~"));
        assert!(!is_key_repeat("\x1b[200~:2u\x1b[201~"));
    }

    #[test]
    fn kitty_event_types_parse() {
        let seq = parse_kitty_sequence("\x1b[97;5:3u").expect("sequence");
        assert_eq!(seq.event_type, KeyEventType::Release);
        assert_eq!(seq.codepoint, 97);
        assert_eq!(seq.modifier, 4);
    }

    #[test]
    fn text_vs_control_classification() {
        assert_eq!(parse_text("hello", false), Some("hello".to_string()));
        assert_eq!(parse_text(" ", false), Some(" ".to_string()));
        assert_eq!(parse_text("héllo", false), Some("héllo".to_string()));
        assert_eq!(parse_text("\x1b[A", false), None);
        assert_eq!(parse_text("\r", false), None);
    }

    #[test]
    fn query_response_detection() {
        assert!(is_kitty_query_response("\x1b[?1u"));
        assert!(is_kitty_query_response("\x1b[?31u"));
        assert!(!is_kitty_query_response("\x1b[?u"));
        assert!(!is_kitty_query_response("\x1b[97u"));
    }

    #[test]
    fn unrecognized_input_is_none_not_error() {
        assert_eq!(parse_key("\x1b[999;999;999z", false), None);
        assert_eq!(parse_key("", false), None);
        assert!(!matches_key("\x1b[?25l", "escape", false));
    }
}
