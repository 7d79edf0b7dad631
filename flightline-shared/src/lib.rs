pub mod models;

pub use models::flight::Flight;
pub use models::points::ClientPoints;
