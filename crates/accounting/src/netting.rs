//! Pure netting-position transitions.
//!
//! One fill moves the `(net_qty, avg_entry_price)` pair through exactly one
//! of three shapes: same-side increase, opposite-side close (partial or
//! full), or cross-through reversal. The persistence layer applies the
//! returned transition verbatim, so two runs over the same fill sequence
//! produce identical positions and balances.

use rust_decimal::Decimal;

/// The mutable core of a netting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionState {
    pub net_qty: Decimal,
    pub avg_entry_price: Decimal,
}

impl PositionState {
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.net_qty.is_zero()
    }
}

/// A realized close produced by an opposite-side fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedLot {
    pub closed_qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
}

/// Outcome of applying one fill to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTransition {
    pub next: PositionState,
    pub closed: Option<ClosedLot>,
    /// True when the fill crossed through zero and re-opened the opposite
    /// side at the fill price.
    pub reopened: bool,
}

/// Applies a signed fill quantity at `fill_price` to `state`.
#[must_use]
pub fn apply_fill(
    state: PositionState,
    fill_qty_signed: Decimal,
    fill_price: Decimal,
) -> FillTransition {
    let existing = state.net_qty;
    let same_side = existing.is_zero()
        || (existing > Decimal::ZERO && fill_qty_signed > Decimal::ZERO)
        || (existing < Decimal::ZERO && fill_qty_signed < Decimal::ZERO);

    if same_side {
        let new_qty = existing + fill_qty_signed;
        let new_avg = if existing.is_zero() {
            fill_price
        } else {
            (existing.abs() * state.avg_entry_price + fill_qty_signed.abs() * fill_price)
                / new_qty.abs()
        };
        return FillTransition {
            next: PositionState {
                net_qty: new_qty,
                avg_entry_price: new_avg,
            },
            closed: None,
            reopened: false,
        };
    }

    let closed_qty = existing.abs().min(fill_qty_signed.abs());
    let realized_pnl = if existing > Decimal::ZERO {
        (fill_price - state.avg_entry_price) * closed_qty
    } else {
        (state.avg_entry_price - fill_price) * closed_qty
    };
    let closed = ClosedLot {
        closed_qty,
        entry_price: state.avg_entry_price,
        exit_price: fill_price,
        realized_pnl,
    };

    let new_qty = existing + fill_qty_signed;
    if new_qty.is_zero() {
        // Full close.
        FillTransition {
            next: PositionState::default(),
            closed: Some(closed),
            reopened: false,
        }
    } else if (existing > Decimal::ZERO) == (new_qty > Decimal::ZERO) {
        // Partial close: magnitude shrinks, entry price unchanged.
        FillTransition {
            next: PositionState {
                net_qty: new_qty,
                avg_entry_price: state.avg_entry_price,
            },
            closed: Some(closed),
            reopened: false,
        }
    } else {
        // Cross-through: the old side is fully realized and the remainder
        // opens the opposite side at the fill price.
        FillTransition {
            next: PositionState {
                net_qty: new_qty,
                avg_entry_price: fill_price,
            },
            closed: Some(closed),
            reopened: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long(qty: Decimal, avg: Decimal) -> PositionState {
        PositionState {
            net_qty: qty,
            avg_entry_price: avg,
        }
    }

    #[test]
    fn test_open_from_flat_takes_fill_price() {
        let t = apply_fill(PositionState::default(), dec!(2), dec!(1.1000));
        assert_eq!(t.next, long(dec!(2), dec!(1.1000)));
        assert!(t.closed.is_none());
        assert!(!t.reopened);
    }

    #[test]
    fn test_same_side_increase_weights_average() {
        // +1 @ 1.10, then +1 @ 1.12 => +2 @ 1.11
        let t = apply_fill(long(dec!(1), dec!(1.10)), dec!(1), dec!(1.12));
        assert_eq!(t.next, long(dec!(2), dec!(1.11)));
        assert!(t.closed.is_none());
    }

    #[test]
    fn test_partial_close_realizes_on_closed_qty() {
        // BUY 2 @ 1.1000 then SELL 1 @ 1.1010:
        // position +1 @ 1.1000, realized +0.0010
        let t = apply_fill(long(dec!(2), dec!(1.1000)), dec!(-1), dec!(1.1010));
        assert_eq!(t.next, long(dec!(1), dec!(1.1000)));
        let lot = t.closed.unwrap();
        assert_eq!(lot.closed_qty, dec!(1));
        assert_eq!(lot.realized_pnl, dec!(0.0010));
        assert!(!t.reopened);
    }

    #[test]
    fn test_full_close_zeroes_position() {
        let t = apply_fill(long(dec!(1), dec!(1.1000)), dec!(-1), dec!(1.0990));
        assert!(t.next.is_flat());
        assert_eq!(t.next.avg_entry_price, dec!(0));
        assert_eq!(t.closed.unwrap().realized_pnl, dec!(-0.0010));
    }

    #[test]
    fn test_cross_through_realizes_then_reopens_short() {
        // +1 @ 1.10, SELL 3 @ 1.09: realize -0.01 on 1, open -2 @ 1.09.
        let t = apply_fill(long(dec!(1), dec!(1.10)), dec!(-3), dec!(1.09));
        assert_eq!(t.next, long(dec!(-2), dec!(1.09)));
        let lot = t.closed.unwrap();
        assert_eq!(lot.closed_qty, dec!(1));
        assert_eq!(lot.realized_pnl, dec!(-0.01));
        assert!(t.reopened);
    }

    #[test]
    fn test_short_side_pnl_sign() {
        // -2 @ 1.10, BUY 1 @ 1.09 => realized +0.01 on 1, remain -1 @ 1.10.
        let t = apply_fill(long(dec!(-2), dec!(1.10)), dec!(1), dec!(1.09));
        assert_eq!(t.next, long(dec!(-1), dec!(1.10)));
        assert_eq!(t.closed.unwrap().realized_pnl, dec!(0.01));
    }

    #[test]
    fn test_transitions_compose_deterministically() {
        // Replay the same sequence twice; end state must match exactly.
        let fills = [
            (dec!(2), dec!(1.1000)),
            (dec!(-1), dec!(1.1010)),
            (dec!(-3), dec!(1.0990)),
            (dec!(2), dec!(1.1005)),
        ];
        let run = || {
            let mut state = PositionState::default();
            let mut realized = Decimal::ZERO;
            for (qty, price) in fills {
                let t = apply_fill(state, qty, price);
                if let Some(lot) = t.closed {
                    realized += lot.realized_pnl;
                }
                state = t.next;
            }
            (state, realized)
        };
        assert_eq!(run(), run());
    }
}
