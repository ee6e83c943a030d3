//! Types shared by every crate in the Duka storefront workspace.
//!
//! * [`Money`] is the single monetary type. It holds integer cents, so sums of partial payments never drift.
//! * [`Secret`] hides credentials from `Debug` and `Display` output.
mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{round_money, Money, MoneyConversionError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
