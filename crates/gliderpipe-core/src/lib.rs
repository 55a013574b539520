pub mod artifact;
pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod rename;
pub mod resolver;
pub mod split;
pub mod teos10;
pub mod units;
