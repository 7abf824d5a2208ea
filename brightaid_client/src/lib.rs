//! Client-side data layer for the BrightAid donation platform.
//!
//! [`ApiClient`] talks to the REST backend. The role stores in [`store`]
//! cache what a donor, NGO or school dashboard shows and refresh it in
//! parallel. [`dialog`] and [`messaging`] carry the form submissions.

pub mod api;
pub mod config;
pub mod dialog;
pub mod error;
pub mod filters;
pub mod gamification;
pub mod identity;
pub mod messaging;
pub mod models;
pub mod store;
pub mod utils;

pub use api::{ApiClient, ProjectFilter, UploadFile};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use identity::IdentityStorage;
pub use store::{DonorStore, NgoStore, RefreshOutcome, SchoolStore};
