//! Daily Spend Guard - UTC-day Purchase Cap
//!
//! Caps cumulative purchase spend per UTC calendar day. The window is
//! derived from the current date on every check, so the counter resets
//! implicitly at midnight UTC with no scheduled job. Owned and mutated
//! exclusively by the acquisition engine.
//!
//! The asymmetry is deliberate: spend is recorded when payment confirms,
//! and stays recorded even if the ownership check afterwards fails.
//! The money left either way.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Daily spend guard enforcing the UTC-day purchase cap.
pub struct DailySpendGuard {
  /// Cumulative cap per UTC day, in native units.
  cap: Decimal,
  /// Day the counter belongs to.
  day: NaiveDate,
  /// Spend accumulated within `day`.
  spent: Decimal,
}

impl DailySpendGuard {
  /// Create a new guard with an empty counter for today.
  pub fn new(cap: Decimal) -> Self {
    Self {
      cap,
      day: Utc::now().date_naive(),
      spent: Decimal::ZERO,
    }
  }

  /// Whether spending `amount` now would stay within today's cap.
  ///
  /// Spending exactly up to the cap is allowed; only pushing the
  /// cumulative total above it is blocked.
  pub fn can_spend(&mut self, amount: Decimal) -> bool {
    self.admit(amount, Utc::now().date_naive())
  }

  /// Count a confirmed purchase against today's window.
  pub fn record_spend(&mut self, amount: Decimal) {
    self.note(amount, Utc::now().date_naive());
  }

  /// Spend accumulated in the current UTC day.
  pub fn spent_today(&self) -> Decimal {
    self.spent
  }

  /// Cap headroom remaining today.
  pub fn remaining(&self) -> Decimal {
    (self.cap - self.spent).max(Decimal::ZERO)
  }

  fn admit(&mut self, amount: Decimal, today: NaiveDate) -> bool {
    self.roll_over(today);
    let allowed = self.spent + amount <= self.cap;
    if !allowed {
      debug!(
        amount = %amount,
        spent = %self.spent,
        cap = %self.cap,
        "Daily spend cap would be exceeded"
      );
    }
    allowed
  }

  fn note(&mut self, amount: Decimal, today: NaiveDate) {
    self.roll_over(today);
    self.spent += amount;
    info!(
      amount = %amount,
      spent_today = %self.spent,
      cap = %self.cap,
      "Recorded purchase spend"
    );
  }

  fn roll_over(&mut self, today: NaiveDate) {
    if today != self.day {
      info!(
        previous_day = %self.day,
        previous_spent = %self.spent,
        "New UTC day, resetting spend counter"
      );
      self.day = today;
      self.spent = Decimal::ZERO;
    }
  }
}
