pub mod bar;
pub mod indicators;
pub mod opportunity;
pub mod scan;
pub mod setup;

pub use bar::*;
pub use indicators::*;
pub use opportunity::*;
pub use scan::*;
pub use setup::*;
