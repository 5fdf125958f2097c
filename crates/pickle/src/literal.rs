//! Decoders for the textual and variable-width operands of the older
//! protocols.

use crate::graph::Value;

/// Parse a decimal integer line (`INT`, `LONG`, memo keys).
///
/// Values outside `i64` keep their normalized decimal text.
pub fn parse_int(text: &str) -> Option<Value> {
    let text = text.trim();
    let text = text.strip_suffix('L').unwrap_or(text);
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Int(i));
    }
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    Some(Value::BigInt(if negative {
        format!("-{digits}").into()
    } else {
        digits.into()
    }))
}

/// Widest `LONG1`/`LONG4` operand converted to decimal text. Python itself
/// refuses `str()` on ints past 4300 digits; this is about 2400 digits.
pub const MAX_DECIMAL_BYTES: usize = 1024;

/// Decode a little-endian two's-complement integer (`LONG1`, `LONG4`).
///
/// Operands wider than [`MAX_DECIMAL_BYTES`] are not converted; they load as
/// a `<int of N bytes>` summary.
pub fn decode_long(bytes: &[u8]) -> Value {
    let Some(&last) = bytes.last() else {
        return Value::Int(0);
    };
    let negative = last & 0x80 != 0;
    if bytes.len() > MAX_DECIMAL_BYTES {
        log::debug!("{}-byte integer operand left unconverted", bytes.len());
        return Value::BigInt(format!("<int of {} bytes>", bytes.len()).into());
    }
    if bytes.len() <= 8 {
        let fill = if negative { 0xff } else { 0x00 };
        let mut buf = [fill; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        return Value::Int(i64::from_le_bytes(buf));
    }

    // Magnitude, most significant byte first.
    let mut magnitude: Vec<u8> = bytes.iter().rev().copied().collect();
    if negative {
        for b in &mut magnitude {
            *b = !*b;
        }
        for b in magnitude.iter_mut().rev() {
            let (sum, carry) = b.overflowing_add(1);
            *b = sum;
            if !carry {
                break;
            }
        }
    }

    let digits = to_decimal(magnitude);
    if let Ok(i) = format!("{}{digits}", if negative { "-" } else { "" }).parse::<i64>() {
        return Value::Int(i);
    }
    Value::BigInt(if negative {
        format!("-{digits}").into()
    } else {
        digits.into()
    })
}

/// Decimal text of a big-endian base-256 magnitude.
///
/// Works on 32-bit limbs and peels nine decimal digits per pass.
fn to_decimal(magnitude: Vec<u8>) -> String {
    const CHUNK: u64 = 1_000_000_000;

    let pad = (4 - magnitude.len() % 4) % 4;
    let mut limbs: Vec<u32> = std::iter::repeat(0u8)
        .take(pad)
        .chain(magnitude)
        .collect::<Vec<u8>>()
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let mut chunks: Vec<u32> = Vec::new();
    let mut start = 0;
    loop {
        while limbs.get(start) == Some(&0) {
            start += 1;
        }
        if start == limbs.len() {
            break;
        }
        let mut remainder: u64 = 0;
        for limb in &mut limbs[start..] {
            let acc = (remainder << 32) | u64::from(*limb);
            *limb = (acc / CHUNK) as u32;
            remainder = acc % CHUNK;
        }
        chunks.push(remainder as u32);
    }

    let mut chunks = chunks.iter().rev();
    let Some(head) = chunks.next() else {
        return "0".to_string();
    };
    let mut out = head.to_string();
    for chunk in chunks {
        out.push_str(&format!("{chunk:09}"));
    }
    out
}

/// Bytes as Latin-1 text; every byte maps to the code point of equal value.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode the quoted operand of the protocol-0 `STRING` opcode.
pub fn unquote_string(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.len() < 2 {
        return None;
    }
    let quote = line[0];
    if !(quote == b'\'' || quote == b'"') || line[line.len() - 1] != quote {
        return None;
    }
    let body = &line[1..line.len() - 1];
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b != b'\\' || i + 1 >= body.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let esc = body[i + 1];
        i += 2;
        match esc {
            b'\\' => out.push(b'\\'),
            b'\'' => out.push(b'\''),
            b'"' => out.push(b'"'),
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'\n' => {}
            b'x' => {
                let hex = body.get(i..i + 2)?;
                let value = u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?;
                out.push(value);
                i += 2;
            }
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                let mut taken = 0;
                while taken < 2 {
                    match body.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            taken += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    Some(latin1(&out))
}

/// Decode the `raw-unicode-escape` operand of the protocol-0 `UNICODE` opcode.
pub fn raw_unicode_escape(line: &[u8]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < line.len() {
        if line[i] == b'\\' {
            let width = match line.get(i + 1) {
                Some(b'u') => 4,
                Some(b'U') => 8,
                _ => 0,
            };
            if width > 0 {
                let decoded = line
                    .get(i + 2..i + 2 + width)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .and_then(char::from_u32);
                if let Some(c) = decoded {
                    out.push(c);
                    i += 2 + width;
                    continue;
                }
            }
        }
        out.push(char::from(line[i]));
        i += 1;
    }
    out
}
