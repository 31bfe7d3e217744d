//! Single-layer decoding of percent-encoding and HTML character references.
//!
//! # Responsibility
//! - Produce a scratch copy of attacker text with one encoding layer removed,
//!   so detectors can see obfuscated payloads.
//!
//! # Invariants
//! - Exactly one left-to-right pass; decoded output is never decoded again.
//!   `%253c` becomes `%3c`, not `<`.
//! - Input is never mutated; unchanged input is returned borrowed.
//! - Runs in time linear in input length.

use std::borrow::Cow;

/// Decodes one layer of `%XX` escapes and `&name;` / `&#N;` / `&#xH;`
/// references.
///
/// Malformed escapes are kept verbatim. Percent-decoded bytes that do not form
/// valid UTF-8 are replaced with U+FFFD.
pub fn decode_once(input: &str) -> Cow<'_, str> {
    if !input.bytes().any(|b| b == b'%' || b == b'&') {
        return Cow::Borrowed(input);
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut changed = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if let Some(value) = percent_byte(&bytes[i..]) {
                    out.push(value);
                    i += 3;
                    changed = true;
                    continue;
                }
            }
            b'&' => {
                if let Some((decoded, consumed)) = decode_reference(&bytes[i..]) {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(decoded.encode_utf8(&mut buf).as_bytes());
                    i += consumed;
                    changed = true;
                    continue;
                }
            }
            _ => {}
        }
        out.push(bytes[i]);
        i += 1;
    }

    if !changed {
        return Cow::Borrowed(input);
    }

    match String::from_utf8(out) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(err) => Cow::Owned(String::from_utf8_lossy(err.as_bytes()).into_owned()),
    }
}

fn percent_byte(rest: &[u8]) -> Option<u8> {
    if rest.len() < 3 {
        return None;
    }
    let high = hex_value(rest[1])?;
    let low = hex_value(rest[2])?;
    Some(high << 4 | low)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decodes one character reference at the start of `rest` (which begins with
/// `&`). Returns the character and the number of bytes consumed.
fn decode_reference(rest: &[u8]) -> Option<(char, usize)> {
    if rest.get(1) == Some(&b'#') {
        return decode_numeric_reference(rest);
    }

    // Longest named reference we recognize is 7 bytes (`newline`).
    let name_len = rest[1..]
        .iter()
        .take(8)
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if name_len == 0 || rest.get(1 + name_len) != Some(&b';') {
        return None;
    }
    let name = std::str::from_utf8(&rest[1..1 + name_len]).ok()?;
    let decoded = named_reference(&name.to_ascii_lowercase())?;
    Some((decoded, name_len + 2))
}

fn decode_numeric_reference(rest: &[u8]) -> Option<(char, usize)> {
    let (radix, digits_start) = match rest.get(2) {
        Some(b'x') | Some(b'X') => (16, 3),
        _ => (10, 2),
    };

    let mut value: u32 = 0;
    let mut end = digits_start;
    while let Some(&byte) = rest.get(end) {
        let digit = match radix {
            16 => hex_value(byte).map(u32::from),
            _ if byte.is_ascii_digit() => Some(u32::from(byte - b'0')),
            _ => None,
        };
        let Some(digit) = digit else {
            break;
        };
        // Saturate instead of overflowing; anything past U+10FFFF is rejected
        // below.
        value = value.saturating_mul(radix).saturating_add(digit);
        end += 1;
    }

    if end == digits_start {
        return None;
    }
    let decoded = char::from_u32(value)?;
    if rest.get(end) == Some(&b';') {
        end += 1;
    }
    Some((decoded, end))
}

fn named_reference(name: &str) -> Option<char> {
    let decoded = match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "sol" => '/',
        "bsol" => '\\',
        "colon" => ':',
        "semi" => ';',
        "lpar" => '(',
        "rpar" => ')',
        "lsqb" => '[',
        "rsqb" => ']',
        "lcub" => '{',
        "rcub" => '}',
        "period" => '.',
        "equals" => '=',
        "num" => '#',
        "excl" => '!',
        "percnt" => '%',
        "plus" => '+',
        "comma" => ',',
        "grave" => '`',
        "quest" => '?',
        "vert" => '|',
        "tab" => '\t',
        "newline" => '\n',
        _ => return None,
    };
    Some(decoded)
}
