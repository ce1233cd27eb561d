pub mod battery;
pub mod forecast;
pub mod samples;

pub use battery::*;
pub use forecast::*;
pub use samples::*;
