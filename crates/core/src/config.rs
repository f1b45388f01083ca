use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub oms: OmsConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    pub symbol: String,
    pub timeframe: String,
    /// Provider selector: "mock" or "real".
    pub provider: String,
    pub ingest_overlap_candles: i64,
    pub initial_backfill_days: i64,
    pub retention_days: i64,
    pub broker_api_url: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            timeframe: "M5".to_string(),
            provider: "mock".to_string(),
            ingest_overlap_candles: 10,
            initial_backfill_days: 7,
            retention_days: 180,
            broker_api_url: "https://marketdata.example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub spread_pips: Decimal,
    pub slippage_pips: Decimal,
    pub pip_size: Decimal,
    pub contract_size: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            spread_pips: dec!(1.0),
            slippage_pips: dec!(0.5),
            pip_size: dec!(0.0001),
            contract_size: dec!(1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub currency: String,
    pub leverage: Decimal,
    pub initial_balance: Decimal,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            leverage: dec!(30),
            initial_balance: dec!(10000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmsConfig {
    pub min_qty: Decimal,
    pub allowed_symbols: Vec<String>,
}

impl Default for OmsConfig {
    fn default() -> Self {
        Self {
            min_qty: dec!(0.01),
            allowed_symbols: vec!["EURUSD".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub atr_period: usize,
    pub sl_atr_mult: Decimal,
    pub tp_atr_mult: Decimal,
    pub cooldown_candles: i64,
    pub warmup_limit: i64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            ema_fast_period: 20,
            ema_slow_period: 50,
            atr_period: 14,
            sl_atr_mult: dec!(1.5),
            tp_atr_mult: dec!(2.0),
            cooldown_candles: 0,
            warmup_limit: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_open_positions: i32,
    pub max_open_positions_per_symbol: i32,
    pub max_total_notional: Decimal,
    pub max_symbol_notional: Decimal,
    pub risk_per_trade_pct: Decimal,
    pub daily_loss_limit_pct: Decimal,
    pub daily_loss_limit_amount: Decimal,
    pub lot_step: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_open_positions: 5,
            max_open_positions_per_symbol: 1,
            max_total_notional: dec!(1000000000),
            max_symbol_notional: dec!(1000000000),
            risk_per_trade_pct: dec!(0.01),
            daily_loss_limit_pct: dec!(0.05),
            daily_loss_limit_amount: dec!(0),
            lot_step: dec!(0.01),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/fx_paper".to_string(),
                max_connections: 10,
            },
            market_data: MarketDataConfig::default(),
            execution: ExecutionConfig::default(),
            account: AccountConfig::default(),
            oms: OmsConfig::default(),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_consistent() {
        let config = AppConfig::default();
        assert_eq!(config.market_data.symbol, "EURUSD");
        assert_eq!(config.market_data.timeframe, "M5");
        assert_eq!(config.market_data.provider, "mock");
        assert!(config.oms.allowed_symbols.contains(&"EURUSD".to_string()));
        assert!(config.strategy.ema_fast_period < config.strategy.ema_slow_period);
    }

    #[test]
    fn test_default_execution_params_match_pip_math() {
        let config = ExecutionConfig::default();
        assert_eq!(config.pip_size, dec!(0.0001));
        assert_eq!(config.contract_size, dec!(1.0));
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.port, config.server.port);
        assert_eq!(back.risk.lot_step, config.risk.lot_step);
        assert_eq!(back.account.initial_balance, config.account.initial_balance);
    }
}
