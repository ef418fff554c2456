//! Base-62 integers and the compact number notation used by compress-json.
//!
//! Integers are written with the alphabet `0-9A-Za-z`. Fractional numbers are
//! written as `int.rev_frac[.[-]rev_exp]`: the fractional digits and exponent
//! digits are reversed before being base-62 encoded so that leading zeros
//! survive. A part that cannot be represented safely is written as a decimal
//! literal prefixed with `:`.

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const RADIX: u64 = 62;

/// Largest integer an f64 represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

fn digit_value(c: u8) -> Option<u64> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u64),
        b'A'..=b'Z' => Some((c - b'A') as u64 + 10),
        b'a'..=b'z' => Some((c - b'a') as u64 + 36),
        _ => None,
    }
}

/// Encode an unsigned integer in base 62.
pub fn int_to_s(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[(n % RADIX) as usize]);
        n /= RADIX;
    }
    digits.reverse();
    // Alphabet is ASCII
    String::from_utf8(digits).unwrap_or_default()
}

/// Decode a base-62 integer. Returns `None` on an empty string, a character
/// outside the alphabet, or overflow.
pub fn s_to_int(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    s.bytes().try_fold(0u64, |acc, c| {
        acc.checked_mul(RADIX)?.checked_add(digit_value(c)?)
    })
}

/// Decode a base-62 integer with floating accumulation, the way values past
/// 2^53 were produced by the encoder in the first place.
fn s_to_float(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.bytes().try_fold(0f64, |acc, c| {
        Some(acc * RADIX as f64 + digit_value(c)? as f64)
    })
}

fn reverse(s: &str) -> String {
    s.chars().rev().collect()
}

/// Encode a decimal digit string, falling back to a `:` literal when the
/// digits would not survive an integer round-trip (leading zeros, too large).
fn int_str_to_s(digits: &str) -> String {
    let canonical = digits == "0" || !digits.starts_with('0');
    match digits.parse::<u64>() {
        Ok(n) if canonical && n <= MAX_SAFE_INTEGER => int_to_s(n),
        _ => format!(":{digits}"),
    }
}

fn s_to_int_str(s: &str) -> Option<String> {
    if let Some(literal) = s.strip_prefix(':') {
        if literal.is_empty() || !literal.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        return Some(literal.to_string());
    }
    s_to_int(s).map(|n| n.to_string())
}

/// Encode a finite number in compact notation.
pub fn num_to_s(num: f64) -> String {
    if num < 0.0 {
        return format!("-{}", num_to_s(-num));
    }
    if num.fract() == 0.0 && num <= MAX_SAFE_INTEGER as f64 {
        return int_to_s(num as u64);
    }

    // Shortest round-trip form, always with an exponent: "1.5e300", "1e-7"
    let formatted = format!("{num:e}");
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, "0"));

    let mut out = format!(
        "{}.{}",
        int_str_to_s(int_part),
        int_str_to_s(&reverse(frac_part))
    );
    if exponent != "0" {
        out.push('.');
        let digits = match exponent.strip_prefix('-') {
            Some(rest) => {
                out.push('-');
                rest
            }
            None => exponent,
        };
        out.push_str(&int_str_to_s(&reverse(digits)));
    }
    out
}

/// Decode a number written in compact notation.
///
/// An empty fractional part (`"1."`) reads as the integer part alone.
pub fn s_to_num(s: &str) -> Option<f64> {
    if let Some(rest) = s.strip_prefix('-') {
        if rest.starts_with('-') {
            return None;
        }
        return s_to_num(rest).map(|n| -n);
    }

    let mut parts = s.split('.');
    let int_part = parts.next()?;
    let frac_part = match parts.next() {
        Some(frac) if !frac.is_empty() => frac,
        _ => return s_to_float(int_part),
    };
    let exp_part = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let mut text = format!(
        "{}.{}",
        s_to_int_str(int_part)?,
        reverse(&s_to_int_str(frac_part)?)
    );
    if let Some(exp) = exp_part {
        text.push('e');
        let digits = match exp.strip_prefix('-') {
            Some(rest) => {
                text.push('-');
                rest
            }
            None => exp,
        };
        text.push_str(&reverse(&s_to_int_str(digits)?));
    }
    text.parse::<f64>().ok()
}
