pub mod cli;
pub mod codec;
pub mod config;
pub mod domain;
pub mod errors;
pub mod resolvers;
pub mod services;
pub mod sources;
pub mod storage;
