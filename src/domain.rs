pub mod error;
pub mod logging;
pub mod model;
pub mod port;
pub mod reconciler;
pub mod service;
