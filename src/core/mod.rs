//! Core data types shared by the scheduler, the workers and the executors.

pub mod descriptor;
pub mod environment;
pub mod output;
pub mod retry;
pub mod status;
