pub mod analysis;
pub mod enums;
pub mod passport;

pub use analysis::*;
pub use enums::*;
pub use passport::*;
