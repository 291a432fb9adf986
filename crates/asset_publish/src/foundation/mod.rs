//! Foundation utilities shared by the pipeline stages

pub mod logging;
