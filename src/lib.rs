pub mod aggregate;
pub mod config;
pub mod distribute;
pub mod error;
pub mod group;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod readings;
pub mod wire;

pub use config::RunConfig;
pub use error::RankError;
pub use pipeline::run;
