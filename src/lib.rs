pub mod classification;
pub mod clearsky;
pub mod config;
pub mod equation;
pub mod errors;
pub mod limits;
pub mod loss;
pub mod outlier;
pub mod parallel;
pub mod pipeline;
pub mod power;
pub mod sun_filter;
pub mod theoretical;
pub mod timeseries;
pub mod unavailability;
