pub mod analytics;
pub mod price;
pub mod settings;
pub mod transaction;
