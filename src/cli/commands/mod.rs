pub mod advance;
pub mod category;
pub mod config;
pub mod definition;
pub mod generate;
pub mod invoice;
pub mod system;
