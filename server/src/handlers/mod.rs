pub mod donor_handlers;
pub mod job_handler;
pub mod ngo_handlers;
pub mod school_handlers;
