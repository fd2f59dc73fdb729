pub mod annotation;
pub mod archive;
pub mod builder;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod header;
pub mod index;
pub mod patch;
pub mod paths;
pub mod util;
pub mod warn;
