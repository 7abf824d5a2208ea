pub mod donor;
pub mod jobs;
pub mod ngo;
pub mod school;
