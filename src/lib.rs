pub mod ablation;
pub mod aggregate;
pub mod artifact;
pub mod cli;
pub mod compare;
pub mod error;
pub mod extract;
pub mod index;
pub mod logging;
pub mod model;
pub mod report;
pub mod sink;
