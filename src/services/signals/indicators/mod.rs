//! Technical indicator implementations.

pub mod change;
pub mod ema;
pub mod levels;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use change::PriceChange;
pub use ema::ewm_series;
pub use levels::{Levels, SupportResistance};
pub use macd::{Macd, MacdOutput};
pub use rsi::Rsi;
pub use sma::{PriceField, Sma};
