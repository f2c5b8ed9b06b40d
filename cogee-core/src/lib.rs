#![doc = "cogee-core: core logic library for cogee."]

//! This crate holds the domain types, service contracts and process logic for
//! discovering Cloud Storage objects and registering them as Earth Engine assets.
//! Transport, credentials and CLI concerns live in the `cogee` crate, which
//! implements the contracts in [`contract`] against the real REST APIs.
//!
//! # Usage
//! - [`listing`]: bucket and prefix discovery
//! - [`collection`]: make sure the target image collection exists
//! - [`register`]: register matching objects into a collection

pub mod asset_id;
pub mod collection;
pub mod contract;
pub mod error;
pub mod listing;
pub mod register;

pub use error::{ApiError, CogeeError, ObjectError};
