//! Development opportunity API and the board command line.

pub mod config;
pub mod graphql;
pub mod http;
