pub mod any;
pub mod cache;
pub mod display;
