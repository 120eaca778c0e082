mod flight;
mod population;
mod risk;

pub use flight::FlightSystem;
pub use population::PopulationSystem;
pub use risk::RiskSystem;
