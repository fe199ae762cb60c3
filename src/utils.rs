use uuid::Uuid;

use crate::prelude::*;

pub fn now() -> DateTime {
  Utc::now().naive_utc()
}

/// First moment of the calendar month containing `at` (day 1, 00:00:00 UTC).
pub fn month_start(at: DateTime) -> DateTime {
  at.date()
    .with_day(1)
    .and_then(|day| day.and_hms_opt(0, 0, 0))
    .unwrap_or(at)
}

/// Short uppercase code for a store name. Falls back to `STORE`.
pub fn store_code(name: &str) -> String {
  let code: String = name
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .take(6)
    .collect::<String>()
    .to_uppercase();
  if code.is_empty() { String::from("STORE") } else { code }
}

/// `code` never contains `-`, so distinct store codes give distinct numbers.
pub fn order_number(code: &str, seq: i64) -> String {
  format!("ORD-{code}-{seq:06}")
}

/// `XXXX-XXXX-XXXX-XXXX` serial from a random uuid
pub fn license_serial() -> String {
  let raw = Uuid::new_v4().simple().to_string().to_uppercase();
  raw
    .as_bytes()
    .chunks(4)
    .take(4)
    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
    .collect::<Vec<_>>()
    .join("-")
}

pub fn days(days: u64) -> Duration {
  Duration::from_secs(24 * 60 * 60 * days)
}
