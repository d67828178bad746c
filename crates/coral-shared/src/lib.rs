//! # coral-shared
//!
//! Domain types shared by the ledger store and the contribution service:
//! categories, contribution events, the level table and the clock seam.

pub mod clock;
pub mod constants;
pub mod error;
pub mod level;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ValidationError;
pub use level::{LevelDescriptor, LevelTable};
pub use types::*;
