//! Accounting engine: fill consumption, netting, and mark-to-market.
//!
//! Fills apply in `(ts, id)` order; each consumed fill is stamped with the
//! candle time that consumed it, so a second pass over unchanged state does
//! nothing. Processing the same fill set in the same order across two runs
//! yields identical balances, positions, and snapshots.

use chrono::{DateTime, Utc};
use fx_paper_core::{AccountConfig, EngineError, ExecutionConfig, ExitReason, Result};
use fx_paper_data::{
    AccountRecord, AccountRepository, AccountSnapshotRecord, CandleRecord, CandleRepository,
    FillRepository, NewTrade, PositionRepository, RiskRepository, SnapshotRepository,
    TradeRepository, ACCOUNT_ID,
};
use fx_paper_execution::{PricingModel, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::netting::{apply_fill, PositionState};

/// Unrealized PnL for a netting position at a quote: longs are valued on
/// the bid, shorts on the ask.
#[must_use]
pub fn unrealized_pnl(net_qty: Decimal, avg_entry_price: Decimal, quote: Quote) -> Decimal {
    if net_qty > Decimal::ZERO {
        (quote.bid - avg_entry_price) * net_qty
    } else {
        (avg_entry_price - quote.ask) * net_qty.abs()
    }
}

/// Margin held against a position: `|net_qty| * mid * contract_size /
/// leverage`.
#[must_use]
pub fn position_margin(
    net_qty: Decimal,
    mid: Decimal,
    contract_size: Decimal,
    leverage: Decimal,
) -> Decimal {
    net_qty.abs() * mid * contract_size / leverage
}

/// Non-persisted account valuation at a reference candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub account_id: i32,
    pub asof_open_time: DateTime<Utc>,
    pub balance: Decimal,
    pub equity: Decimal,
    pub unrealized_pnl: Decimal,
    pub margin_used: Decimal,
    pub free_margin: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApplyResult {
    pub applied_fills: usize,
    pub realized_pnl: Decimal,
}

pub struct AccountingEngine {
    account: AccountConfig,
    execution: ExecutionConfig,
}

impl AccountingEngine {
    #[must_use]
    pub fn new(account: AccountConfig, execution: ExecutionConfig) -> Self {
        Self { account, execution }
    }

    /// Ensures the singleton account row exists.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn ensure_account(
        &self,
        conn: &mut PgConnection,
        ts: DateTime<Utc>,
    ) -> Result<AccountRecord> {
        AccountRepository::ensure(
            conn,
            self.account.initial_balance,
            &self.account.currency,
            self.account.leverage,
            ts,
        )
        .await
    }

    /// Values the account at a reference candle without persisting anything.
    /// Longs are valued on the bid, shorts on the ask;
    /// `margin_used = sum(|net_qty| * mid * contract_size / leverage)`.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn compute_account_state(
        &self,
        conn: &mut PgConnection,
        candle: &CandleRecord,
    ) -> Result<AccountState> {
        let account = self.ensure_account(conn, candle.open_time).await?;
        let positions = PositionRepository::open_positions(&mut *conn, ACCOUNT_ID).await?;
        let pricing = PricingModel::from_config(&self.execution);

        let mut unrealized = Decimal::ZERO;
        let mut margin_used = Decimal::ZERO;

        for position in &positions {
            let reference = if position.symbol == candle.symbol {
                candle.clone()
            } else {
                CandleRepository::latest_at_or_before(
                    &mut *conn,
                    &position.symbol,
                    &candle.timeframe,
                    candle.open_time,
                )
                .await?
                .ok_or_else(|| {
                    EngineError::deterministic_safety(format!(
                        "no candle at or before {} for {}",
                        candle.open_time, position.symbol
                    ))
                })?
            };

            let quote = pricing.quote(reference.open);
            unrealized += unrealized_pnl(position.net_qty, position.avg_entry_price, quote);
            margin_used += position_margin(
                position.net_qty,
                quote.mid,
                self.execution.contract_size,
                account.leverage,
            );
        }

        let equity = account.balance + unrealized;
        Ok(AccountState {
            account_id: account.id,
            asof_open_time: candle.open_time,
            balance: account.balance,
            equity,
            unrealized_pnl: unrealized,
            margin_used,
            free_margin: equity - margin_used,
        })
    }

    /// Consumes all unaccounted fills with `ts <= asof` for the symbol, in
    /// `(ts, id)` order, inside the caller's transaction. Realized deltas
    /// append to the balance; every realized close writes a trade row.
    /// Idempotent: a second call with unchanged fills does nothing.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn apply_new_fills(
        &self,
        conn: &mut PgConnection,
        symbol: &str,
        asof: DateTime<Utc>,
    ) -> Result<ApplyResult> {
        self.ensure_account(conn, asof).await?;

        let fills = FillRepository::unaccounted_up_to(&mut *conn, symbol, asof).await?;
        if fills.is_empty() {
            return Ok(ApplyResult {
                applied_fills: 0,
                realized_pnl: Decimal::ZERO,
            });
        }

        // Exclusive locks on the two hot rows for the duration of the write.
        AccountRepository::get_for_update(&mut *conn).await?;
        let existing = PositionRepository::get_for_update(&mut *conn, ACCOUNT_ID, symbol).await?;

        let mut state = existing.as_ref().map_or_else(PositionState::default, |p| {
            PositionState {
                net_qty: p.net_qty,
                avg_entry_price: p.avg_entry_price,
            }
        });
        let mut opened_at = existing.as_ref().and_then(|p| p.opened_at);
        let mut entry_order_id = existing.as_ref().and_then(|p| p.entry_order_id);
        let mut realized_cum = existing
            .as_ref()
            .map_or(Decimal::ZERO, |p| p.realized_pnl_cum);
        let (mut stop_loss, mut take_profit) = existing
            .as_ref()
            .map_or((None, None), |p| (p.stop_loss, p.take_profit));

        let mut realized_total = Decimal::ZERO;
        let mut last_ts = asof;

        for fill in &fills {
            let was_flat = state.is_flat();
            let transition = apply_fill(state, fill.signed_qty(), fill.price);

            if let Some(lot) = transition.closed {
                realized_total += lot.realized_pnl;
                realized_cum += lot.realized_pnl;

                let reason = if transition.reopened {
                    ExitReason::Flip
                } else {
                    ExitReason::Manual
                };
                TradeRepository::insert(
                    &mut *conn,
                    &NewTrade {
                        entry_ts: opened_at.unwrap_or(fill.ts),
                        exit_ts: fill.ts,
                        symbol: symbol.to_string(),
                        qty: lot.closed_qty,
                        entry_price: lot.entry_price,
                        exit_price: lot.exit_price,
                        pnl: lot.realized_pnl,
                        exit_reason: reason,
                        entry_order_id,
                        exit_order_id: Some(fill.order_id),
                    },
                )
                .await?;
            }

            if (was_flat && !transition.next.is_flat()) || transition.reopened {
                opened_at = Some(fill.ts);
                entry_order_id = Some(fill.order_id);
                // Hints from the closed side do not carry into the new one.
                stop_loss = None;
                take_profit = None;
            }
            if transition.next.is_flat() {
                opened_at = None;
                entry_order_id = None;
                stop_loss = None;
                take_profit = None;
            }

            state = transition.next;
            last_ts = fill.ts;
            FillRepository::mark_accounted(&mut *conn, fill.id, asof).await?;
        }

        PositionRepository::upsert(
            &mut *conn,
            ACCOUNT_ID,
            symbol,
            state.net_qty,
            state.avg_entry_price,
            opened_at,
            last_ts,
            stop_loss,
            take_profit,
            realized_cum,
            entry_order_id,
        )
        .await?;

        if !realized_total.is_zero() {
            AccountRepository::add_balance(&mut *conn, realized_total, asof).await?;
        }

        tracing::info!(
            symbol,
            applied = fills.len(),
            realized = %realized_total,
            "applied fills to netting position"
        );

        Ok(ApplyResult {
            applied_fills: fills.len(),
            realized_pnl: realized_total,
        })
    }

    /// Values the account at `candle` and upserts the snapshot for
    /// `(account_id, asof_open_time)`. Also touches the daily equity
    /// baseline for the candle's UTC date, creating it idempotently.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn mark_to_market(
        &self,
        conn: &mut PgConnection,
        asof: DateTime<Utc>,
        candle: &CandleRecord,
    ) -> Result<AccountSnapshotRecord> {
        let state = self.compute_account_state(conn, candle).await?;

        let snapshot = SnapshotRepository::upsert(
            &mut *conn,
            ACCOUNT_ID,
            asof,
            state.balance,
            state.equity,
            state.unrealized_pnl,
            state.margin_used,
            state.free_margin,
        )
        .await?;

        RiskRepository::ensure_daily_equity(
            conn,
            ACCOUNT_ID,
            asof.date_naive(),
            state.equity,
        )
        .await?;

        Ok(snapshot)
    }

    /// Applies fills then marks to market, requiring the exact candle at
    /// `asof`. One transaction from the caller's perspective.
    ///
    /// # Errors
    /// Returns `DeterministicSafety` when the candle at `asof` is absent.
    pub async fn process_accounting_for_candle(
        &self,
        conn: &mut PgConnection,
        symbol: &str,
        timeframe: &str,
        asof: DateTime<Utc>,
    ) -> Result<AccountSnapshotRecord> {
        let candle = CandleRepository::exact(&mut *conn, symbol, timeframe, asof)
            .await?
            .ok_or_else(|| {
                EngineError::deterministic_safety(format!(
                    "accounting requires the candle at {asof} for {symbol}/{timeframe}"
                ))
            })?;

        self.apply_new_fills(conn, symbol, asof).await?;
        self.mark_to_market(conn, asof, &candle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flat_quote(open: Decimal) -> Quote {
        PricingModel::new(dec!(0), dec!(0), dec!(0.0001)).quote(open)
    }

    #[test]
    fn test_long_unrealized_against_candle_open() {
        // +1 @ 1.1000 marked at open 1.1020 with no spread.
        let pnl = unrealized_pnl(dec!(1), dec!(1.1000), flat_quote(dec!(1.1020)));
        assert_eq!(pnl, dec!(0.0020));
    }

    #[test]
    fn test_short_unrealized_sign_mirrors() {
        // -1 @ 1.1000: the same move up is a loss.
        let pnl = unrealized_pnl(dec!(-1), dec!(1.1000), flat_quote(dec!(1.1020)));
        assert_eq!(pnl, dec!(-0.0020));
    }

    #[test]
    fn test_long_is_valued_on_bid_short_on_ask() {
        let quote = PricingModel::new(dec!(1.0), dec!(0), dec!(0.0001)).quote(dec!(1.1000));
        // Long exits into the bid (below mid), short covers at the ask.
        assert_eq!(unrealized_pnl(dec!(1), dec!(1.1000), quote), dec!(-0.00005));
        assert_eq!(unrealized_pnl(dec!(-1), dec!(1.1000), quote), dec!(-0.00005));
    }

    #[test]
    fn test_flat_position_has_no_unrealized() {
        assert_eq!(
            unrealized_pnl(dec!(0), dec!(1.1000), flat_quote(dec!(1.2))),
            dec!(0)
        );
    }

    #[test]
    fn test_position_margin_scales_with_leverage() {
        assert_eq!(
            position_margin(dec!(2), dec!(1.10), dec!(1), dec!(30)),
            dec!(2) * dec!(1.10) / dec!(30)
        );
        assert_eq!(
            position_margin(dec!(-2), dec!(1.10), dec!(1), dec!(30)),
            position_margin(dec!(2), dec!(1.10), dec!(1), dec!(30))
        );
    }
}
