pub mod contexts;
pub mod data;
pub mod services;
pub mod settings;
