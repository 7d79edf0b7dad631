pub mod flight;
pub mod points;
