pub mod cleaned;
pub mod client;
pub mod gmail;
pub mod promo;
