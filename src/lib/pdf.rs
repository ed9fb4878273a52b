pub mod converter;
pub mod helpers;
pub mod models;
pub mod strategy;
