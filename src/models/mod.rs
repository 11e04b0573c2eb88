pub mod attraction;
pub mod plan;
