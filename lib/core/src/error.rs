//! Error handling foundation for the back-office.
//!
//! Only the `Result` alias lives here. Each crate defines its own error enum
//! and fallible storage or I/O returns it wrapped in a `Report`, created with
//! `?` or `.into()` from the bare context.

use rootcause::Report;

/// A Result whose error is a rootcause `Report` around context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
