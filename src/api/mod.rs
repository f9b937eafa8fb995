pub mod poll;
pub mod utils;
