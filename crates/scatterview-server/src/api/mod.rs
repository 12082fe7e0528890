pub mod health;
pub mod scans;

pub use health::health_routes;
pub use scans::initial_scans_fetching;
