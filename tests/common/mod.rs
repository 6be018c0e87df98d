#![allow(dead_code)]

pub mod fixtures;
pub mod stores;

pub use fixtures::*;
pub use stores::*;
