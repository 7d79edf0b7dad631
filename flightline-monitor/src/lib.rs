pub mod registry;

pub use registry::{MonitorRegistry, Subscription};
