//! Core domain models for the cities catalog
//!
//! This crate contains:
//! - Domain models (City, CityStatus, CityDraft)
//! - Record validation rules
//! - Image location helpers shared by storage and engine

pub mod city;
pub mod error;

pub use city::{City, CityDraft, CityStatus, image_extension};
pub use error::{CoreError, Result};
