pub mod interaction;
pub mod params;
pub mod records;
pub mod store;
