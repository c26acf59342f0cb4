pub mod classification;
pub mod draft;
pub mod message;
pub mod priority;
pub mod user;
