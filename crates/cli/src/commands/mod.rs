pub mod demo;
pub mod describe;
pub mod plan;
