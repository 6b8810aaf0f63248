pub mod message;
pub mod plan;
