// Observability: metrics recording and export

pub mod metrics;

pub use metrics::{init, render};

pub use metrics::{documents, numbering, registry};
