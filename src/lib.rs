// Library for tests to access modules

pub mod achievements;
pub mod aggregate;
pub mod alias;
pub mod config;
pub mod engine;
pub mod models;
pub mod reducer;
pub mod store;
pub mod worker;
