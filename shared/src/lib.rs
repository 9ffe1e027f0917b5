mod api;
pub mod util;

pub use api::*;
