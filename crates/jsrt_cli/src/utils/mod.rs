pub mod logger;
pub mod styles;
