pub mod config;
pub mod consts;
pub mod error;
pub mod fetch;
pub mod io;
pub mod scan;
pub mod source;
pub mod stats;
