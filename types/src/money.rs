/// Formats whole dollars with thousands separators, e.g. `$1,234` or `-$1,234`.
///
/// With `show_sign`, positive amounts get a leading `+`. Zero never carries a sign.
pub fn format_money(amount: i64, show_sign: bool) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = match amount {
        a if a < 0 => "-",
        a if a > 0 && show_sign => "+",
        _ => "",
    };
    format!("{sign}${grouped}")
}
