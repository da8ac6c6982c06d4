pub mod analysis;
pub mod user;
