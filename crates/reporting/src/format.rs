//! Display formatting for dashboard figures (en-US conventions).

/// `1234.5, "USD"` → `$1,234.50`. Unknown codes are prefixed verbatim.
pub fn format_currency(value: f64, currency: &str) -> String {
    let symbol = match currency.to_ascii_uppercase().as_str() {
        "USD" | "AUD" | "CAD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "INR" => "₹",
        _ => "",
    };
    let amount = group_thousands(&format!("{:.2}", value.abs()));
    let sign = if value < 0.0 && amount.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    if symbol.is_empty() {
        format!("{sign}{} {amount}", currency.to_ascii_uppercase())
    } else {
        format!("{sign}{symbol}{amount}")
    }
}

/// `2.5, 2` → `2.50%`. The value is already a percentage.
pub fn format_percentage(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}%")
}

/// `1_260_000.0` → `1.3M`; values under a thousand are rounded to integers.
/// The unit is picked after rounding, so `999_950.0` reads `1M`.
pub fn format_compact_number(value: f64) -> String {
    const UNITS: [(f64, &str); 3] = [(1e3, "K"), (1e6, "M"), (1e9, "B")];
    // `+ 0.0` folds negative zero.
    let whole = value.round() + 0.0;
    if whole.abs() < 1e3 {
        return format!("{whole:.0}");
    }

    let (scale, suffix) = UNITS
        .into_iter()
        .find(|(scale, _)| (value * 10.0 / scale).round().abs() < 1e4)
        .unwrap_or(UNITS[UNITS.len() - 1]);
    let tenths = (value * 10.0 / scale).round();
    let scaled = format!("{:.1}", tenths / 10.0);
    let trimmed = scaled.strip_suffix(".0").unwrap_or(&scaled);
    format!("{trimmed}{suffix}")
}

/// `1234567` → `1,234,567`.
pub fn format_number(value: u64) -> String {
    group_thousands(&value.to_string())
}

fn group_thousands(digits: &str) -> String {
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}
