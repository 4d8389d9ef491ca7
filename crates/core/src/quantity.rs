//! Resource quantities compared by value.
//!
//! A quantity such as `1Gi`, `1024Mi` or `1.5e3` is reduced to
//! `m * 2^a * 5^b` with `m` coprime to 10, which is unique for every value
//! a quantity string can express. Two strings are the same quantity exactly
//! when their canonical forms are equal.

/// Canonical form of `s`, or `None` when it is not a quantity.
pub fn canonical_quantity(s: &str) -> Option<String> {
    let s = s.trim();
    let (negative, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let split = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(split);
    let (pow2, pow10) = suffix_exponents(suffix)?;

    let mut mantissa: u128 = 0;
    let mut digits = 0usize;
    let mut frac_len: i64 = 0;
    let mut seen_point = false;
    for c in number.chars() {
        if c == '.' {
            if seen_point {
                return None;
            }
            seen_point = true;
            continue;
        }
        let d = c.to_digit(10)? as u128;
        mantissa = mantissa.checked_mul(10)?.checked_add(d)?;
        digits += 1;
        if seen_point {
            frac_len += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if mantissa == 0 {
        return Some("0".to_string());
    }

    let mut a = pow2 + pow10 - frac_len;
    let mut b = pow10 - frac_len;
    while mantissa % 2 == 0 {
        mantissa /= 2;
        a += 1;
    }
    while mantissa % 5 == 0 {
        mantissa /= 5;
        b += 1;
    }
    let sign = if negative { "-" } else { "" };
    Some(format!("{sign}{mantissa}*2^{a}*5^{b}"))
}

/// Whether `a` and `b` denote the same amount. Unparseable strings compare verbatim.
pub fn quantity_eq(a: &str, b: &str) -> bool {
    match (canonical_quantity(a), canonical_quantity(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// (power of two, power of ten) a suffix multiplies by.
fn suffix_exponents(suffix: &str) -> Option<(i64, i64)> {
    let exps = match suffix {
        "" => (0, 0),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        _ => {
            let exp = suffix.strip_prefix('e').or_else(|| suffix.strip_prefix('E'))?;
            let exp: i64 = exp.parse().ok()?;
            // keeps the exponent arithmetic far from overflow
            if exp.abs() > 1_000 {
                return None;
            }
            (0, exp)
        }
    };
    Some(exps)
}
