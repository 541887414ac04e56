// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounds on money amounts accepted by the ledger.

use bigdecimal::{BigDecimal, Zero};

/// Digits allowed before the decimal point.
pub const MAX_INTEGER_DIGITS: i64 = 18;

/// Digits allowed after the decimal point, ignoring trailing zeros.
pub const MAX_DECIMAL_PLACES: i64 = 8;

/// Whether `amount` is positive and fits the integer and fractional bounds.
///
/// Only digit counts and the exponent are inspected before the sign check,
/// so an input like `1e50000000` is rejected without being expanded.
pub fn amount_in_range(amount: &BigDecimal) -> bool {
    let normalized = amount.normalized();
    let (_, scale) = normalized.as_bigint_and_exponent();
    if scale > MAX_DECIMAL_PLACES {
        return false;
    }
    let digits = i64::try_from(normalized.digits()).unwrap_or(i64::MAX);
    if digits.saturating_sub(scale) > MAX_INTEGER_DIGITS {
        return false;
    }
    normalized > BigDecimal::zero()
}
