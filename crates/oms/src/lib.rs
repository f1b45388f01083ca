pub mod service;

pub use service::{
    OmsService, PlaceOrderOutcome, PlaceOrderRequest, REASON_QTY_BELOW_MIN,
    REASON_SYMBOL_NOT_ALLOWED,
};
