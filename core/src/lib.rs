extern crate self as utxopool_core;

pub mod log;
pub mod task;
