//! Placement flow against a live store.
//!
//! These tests run only when `DATABASE_URL` points at a scratch Postgres
//! database; without it they are skipped. The schema is migrated on entry.

use chrono::{DateTime, TimeZone, Utc};
use fx_paper_core::{AppConfig, Side, Timeframe};
use fx_paper_data::{CandleRepository, NewCandle, OrderRepository};
use fx_paper_oms::{OmsService, PlaceOrderRequest, REASON_SYMBOL_NOT_ALLOWED};
use rust_decimal_macros::dec;
use sqlx::PgPool;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    fx_paper_data::run_migrations(&pool).await.ok()?;
    Some(pool)
}

fn eurusd_candle(ts: DateTime<Utc>) -> NewCandle {
    NewCandle::validated(
        "EURUSD",
        Timeframe::M5,
        ts,
        dec!(1.1000),
        dec!(1.1010),
        dec!(1.0990),
        dec!(1.1005),
        Some(dec!(1000)),
        "mock",
    )
    .unwrap()
}

#[tokio::test]
async fn disallowed_symbol_is_recorded_as_rejected_not_thrown() {
    let Some(pool) = test_pool().await else {
        return;
    };

    // The configured instrument has history; the requested symbol is
    // outside the allow-list and never ingested.
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut tx = pool.begin().await.unwrap();
    CandleRepository::upsert_many(&mut tx, &[eurusd_candle(ts)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let service = OmsService::from_config(&AppConfig::default()).unwrap();
    let mut tx = pool.begin().await.unwrap();
    let outcome = service
        .place(
            &mut tx,
            &PlaceOrderRequest {
                symbol: "GBPJPY".to_string(),
                side: Side::Buy,
                qty: dec!(1),
                stop_loss: None,
                take_profit: None,
                reason: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("validation failures are recorded, not thrown");
    tx.commit().await.unwrap();

    assert_eq!(outcome.order.status, "REJECTED");
    assert_eq!(
        outcome.order.reason.as_deref(),
        Some(REASON_SYMBOL_NOT_ALLOWED)
    );
    assert_eq!(outcome.order.symbol, "GBPJPY");
    assert!(outcome.fill.is_none());

    // The rejection is a persisted order row, anchored to the configured
    // instrument's candle because GBPJPY has no history of its own.
    let stored = OrderRepository::by_id(&pool, outcome.order.id)
        .await
        .unwrap()
        .expect("rejected order row is persisted");
    assert_eq!(stored.status, "REJECTED");
    assert_eq!(stored.ts, ts);
}
