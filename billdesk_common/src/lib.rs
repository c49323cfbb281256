mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{
    AmountConversionError,
    LocalAmount,
    RefAmount,
    LOCAL_CURRENCY_CODE,
    REFERENCE_CURRENCY_CODE,
};
pub use rust_decimal::Decimal;
pub use secret::Secret;
