pub mod config;
pub mod hold;
pub mod path;
pub mod status;
pub mod stop;
