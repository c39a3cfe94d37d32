pub mod normalizer;
pub mod raw;

pub use normalizer::{is_currency_ticker, normalize, normalize_all};
pub use raw::{decimal_from_value, RawRow};
