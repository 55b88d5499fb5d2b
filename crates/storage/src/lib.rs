#![forbid(unsafe_code)]

pub mod normalize;
pub mod repository;
pub mod sqlite;
