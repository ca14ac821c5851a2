//! Canonical domain types shared by every pipeline stage.

mod bar;
mod interval;
mod symbol;
mod timestamp;

pub use bar::{Bar, BarDefect, Series};
pub use interval::{Interval, Lookback};
pub use symbol::Symbol;
pub use timestamp::ZonedDateTime;
