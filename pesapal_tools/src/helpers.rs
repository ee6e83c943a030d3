use duka_common::Money;

/// Pesapal takes amounts as a JSON number in major units.
pub fn pesapal_amount(amount: Money) -> f64 {
    amount.to_major()
}

/// Splits a full name into Pesapal's first and last name fields. Everything after the first word is the last name.
pub fn split_customer_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}
