pub mod build;
pub mod jobs;
