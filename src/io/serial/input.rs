// src/io/serial/input.rs
//
// Parser for user-entered transmit text.
//
// Syntax: space-separated tokens. A token is either a number (0x.. hex,
// 0b.. binary, 0o.. or leading-zero octal, otherwise decimal) in 0..=255,
// or a double-quoted ASCII string. An unterminated string runs to the end.
//
//   0x02 "AT+GMR" 13 10   ->  02 41 54 2B 47 4D 52 0D 0A

use crate::io::error::IoError;

/// Parse transmit text into bytes
pub fn parse_send_input(input: &str) -> Result<Vec<u8>, IoError> {
    let mut result = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(after_quote) = rest.strip_prefix('"') {
            let (literal, remainder) = match after_quote.find('"') {
                Some(end) => (&after_quote[..end], &after_quote[end + 1..]),
                None => (after_quote, ""),
            };
            push_ascii(&mut result, literal)?;
            rest = remainder;
        } else {
            let end = rest.find(' ').unwrap_or(rest.len());
            result.push(parse_byte(&rest[..end])?);
            rest = &rest[end..];
        }
    }

    Ok(result)
}

fn push_ascii(out: &mut Vec<u8>, literal: &str) -> Result<(), IoError> {
    for c in literal.chars() {
        if !c.is_ascii() {
            return Err(IoError::invalid_input(format!(
                "Only ASCII characters are allowed in strings: {:?}",
                c
            )));
        }
        out.push(c as u8);
    }
    Ok(())
}

fn parse_byte(token: &str) -> Result<u8, IoError> {
    let value = parse_integer(token).ok_or_else(|| {
        IoError::invalid_input(format!("Invalid number: {:?}", token))
    })?;
    u8::try_from(value).map_err(|_| {
        IoError::invalid_input(format!("Numbers must be in the range 0-255: {}", value))
    })
}

/// Integer literal with an optional sign and base prefix
fn parse_integer(token: &str) -> Option<i64> {
    let (negative, body) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    let lower = body.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex.to_string(), 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin.to_string(), 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct.to_string(), 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (lower[1..].to_string(), 8)
    } else {
        (lower, 10)
    };

    // from_str_radix would accept a second sign
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i64::from_str_radix(&digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_in_each_base() {
        assert_eq!(parse_send_input("0x41 66 0b1000011 0o104 0105").unwrap(), b"ABCDE".to_vec());
        assert_eq!(parse_send_input("0").unwrap(), vec![0]);
        assert_eq!(parse_send_input("0XFF +1").unwrap(), vec![0xFF, 1]);
    }

    #[test]
    fn test_strings_and_numbers_mixed() {
        assert_eq!(
            parse_send_input("0x02 \"AT+GMR\" 13 10").unwrap(),
            vec![0x02, b'A', b'T', b'+', b'G', b'M', b'R', 0x0D, 0x0A]
        );
        assert_eq!(parse_send_input("\"a b\"").unwrap(), b"a b".to_vec());
        assert_eq!(parse_send_input("\"x\"\"y\"").unwrap(), b"xy".to_vec());
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        assert_eq!(parse_send_input("1 \"hi there").unwrap(), b"\x01hi there".to_vec());
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(parse_send_input("").unwrap().is_empty());
        assert!(parse_send_input("   ").unwrap().is_empty());
        assert!(parse_send_input("\"\"").unwrap().is_empty());
    }

    #[test]
    fn test_range_errors() {
        let err = parse_send_input("256").unwrap_err();
        assert!(err.to_string().contains("0-255"));
        assert!(parse_send_input("-1").is_err());
    }

    #[test]
    fn test_malformed_numbers() {
        assert!(matches!(parse_send_input("0xZZ"), Err(IoError::InvalidInput(_))));
        assert!(parse_send_input("12ab").is_err());
        assert!(parse_send_input("09").is_err());
        assert!(parse_send_input("--5").is_err());
        assert!(parse_send_input("0x").is_err());
    }

    #[test]
    fn test_non_ascii_string_rejected() {
        let err = parse_send_input("\"héllo\"").unwrap_err();
        assert!(err.to_string().contains("ASCII"));
    }
}
