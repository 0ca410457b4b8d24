pub mod baseline;
pub mod classifier;
pub mod engine;

pub use baseline::HistoricalBaseline;
pub use engine::Scanner;
