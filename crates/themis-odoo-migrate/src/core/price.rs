//! Unit price resolution for timesheets and costs.
//!
//! Every candidate is an `Option<Decimal>`: `Some(0)` is a real price and
//! stops the chain, only `None` falls through to the next candidate.

use rust_decimal::Decimal;

/// First present candidate, zero when none is.
pub fn first_present<I>(candidates: I) -> Decimal
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    candidates
        .into_iter()
        .flatten()
        .next()
        .unwrap_or(Decimal::ZERO)
}

/// Timesheet price: row → case×user tariff → user tariff → case tariff →
/// timesheet type list price → zero.
pub fn timesheet_unit_price(
    explicit: Option<Decimal>,
    case_user: Option<Decimal>,
    user_default: Option<Decimal>,
    case_default: Option<Decimal>,
    list_price: Option<Decimal>,
) -> Decimal {
    first_present([explicit, case_user, user_default, case_default, list_price])
}

/// Cost price: total ÷ quantity → row unit price → case×type price → cost
/// type list price → zero.
///
/// The total only counts when the quantity is present and non-zero.
pub fn cost_unit_price(
    total: Option<Decimal>,
    quantity: Option<Decimal>,
    explicit: Option<Decimal>,
    case_type: Option<Decimal>,
    list_price: Option<Decimal>,
) -> Decimal {
    let from_total = match (total, quantity) {
        (Some(total), Some(qty)) if !qty.is_zero() => Some(total / qty),
        _ => None,
    };
    first_present([from_total, explicit, case_type, list_price])
}
