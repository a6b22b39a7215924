pub mod calendar;
pub mod change;
pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

pub use calendar::*;
pub use change::*;
pub use clock::*;
pub use error::*;
pub use traits::*;
pub use types::*;
