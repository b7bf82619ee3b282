//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that the pricing rules, the settlement
//! partition and the spend guard maintain their invariants across
//! random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use nft_flywheel_bot::domain::flywheel::{ask_price, covers_price_with_buffer};
use nft_flywheel_bot::domain::settlement::{SettlementPlan, minimum_output};
use nft_flywheel_bot::usecases::spend_guard::DailySpendGuard;

/// Positive amounts up to 10,000 native units with 4 decimal places.
fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000).prop_map(|n| Decimal::new(n, 4))
}

/// Fractions in [0, 0.99] with 2 decimal places.
fn fraction() -> impl Strategy<Value = Decimal> {
    (0i64..100).prop_map(|n| Decimal::new(n, 2))
}

// ── Settlement Partition Properties ─────────────────────────

proptest! {
    /// The partition conserves the balance exactly: nothing is created
    /// or lost between reserve, swap tranche and top-up.
    #[test]
    fn partition_conserves_balance(
        reserve in amount(),
        extra in amount(),
    ) {
        let balance = reserve + extra;
        let plan = SettlementPlan::partition(balance, reserve).unwrap();
        prop_assert_eq!(
            plan.swap_amount + plan.gas_topup + plan.gas_reserve,
            balance
        );
    }

    /// The swap tranche is exactly 99x the top-up (99% vs 1%).
    #[test]
    fn partition_keeps_the_99_to_1_split(
        reserve in amount(),
        extra in amount(),
    ) {
        let plan = SettlementPlan::partition(reserve + extra, reserve).unwrap();
        prop_assert_eq!(plan.swap_amount, plan.gas_topup * dec!(99));
    }

    /// A balance at or below the reserve never yields a plan.
    #[test]
    fn partition_rejects_unfunded_balance(
        balance in amount(),
        headroom in amount(),
    ) {
        let reserve = balance + headroom;
        prop_assert!(SettlementPlan::partition(balance, reserve).is_err());
    }

    /// The minimum output never exceeds the quote, and a zero slippage
    /// tolerance demands the full quote.
    #[test]
    fn minimum_output_is_bounded_by_quote(
        quote in amount(),
        slippage in fraction(),
    ) {
        let min_out = minimum_output(quote, slippage).unwrap();
        prop_assert!(min_out <= quote);
        prop_assert_eq!(minimum_output(quote, Decimal::ZERO).unwrap(), quote);
    }

    /// A larger slippage tolerance never raises the floor.
    #[test]
    fn minimum_output_monotone_in_slippage(
        quote in amount(),
        s1 in fraction(),
        s2 in fraction(),
    ) {
        let (lo, hi) = if s1 <= s2 { (s1, s2) } else { (s2, s1) };
        prop_assert!(
            minimum_output(quote, hi).unwrap() <= minimum_output(quote, lo).unwrap()
        );
    }
}

// ── Pricing Rule Properties ─────────────────────────────────

proptest! {
    /// The relist ask never drops below cost for a non-negative markup.
    #[test]
    fn ask_price_never_below_cost(
        cost in amount(),
        markup in fraction(),
    ) {
        prop_assert!(ask_price(cost, markup) >= cost);
    }

    /// Ask scales linearly: doubling the cost doubles the ask.
    #[test]
    fn ask_price_scales_linearly(
        cost in amount(),
        markup in fraction(),
    ) {
        prop_assert_eq!(
            ask_price(cost * dec!(2), markup),
            ask_price(cost, markup) * dec!(2)
        );
    }

    /// If a balance affords a price under some buffer, it still affords
    /// it under any smaller buffer.
    #[test]
    fn affordability_monotone_in_buffer(
        price in amount(),
        b1 in fraction(),
        b2 in fraction(),
    ) {
        let (lo, hi) = if b1 <= b2 { (b1, b2) } else { (b2, b1) };
        let balance = price * (Decimal::ONE + hi);
        prop_assert!(covers_price_with_buffer(balance, price, hi));
        prop_assert!(covers_price_with_buffer(balance, price, lo));
    }
}

// ── Daily Spend Guard Properties ────────────────────────────

proptest! {
    /// Whatever sequence of purchase attempts arrives, the recorded
    /// spend for the day never exceeds the cap when every record is
    /// gated by a successful can_spend check.
    #[test]
    fn gated_spend_never_exceeds_cap(
        cap in amount(),
        attempts in prop::collection::vec(amount(), 1..50),
    ) {
        let mut guard = DailySpendGuard::new(cap);
        for attempt in attempts {
            if guard.can_spend(attempt) {
                guard.record_spend(attempt);
            }
        }
        prop_assert!(guard.spent_today() <= cap);
        prop_assert_eq!(guard.remaining(), cap - guard.spent_today());
    }
}
