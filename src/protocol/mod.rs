pub mod cell;
pub mod transport;
