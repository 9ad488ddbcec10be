//! # Wardbook
#![allow(non_snake_case)]
//!
//! Terminal hospital management for a single local operator.
//!
//! This crate provides:
//! - Role-based menus for patients, doctors, pharmacists and administrators
//! - Appointment booking against doctors' 30-minute availability slots
//! - Medical records, appointment outcomes and prescription tracking
//! - Pharmacy inventory with replenishment requests
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (User, Appointment, MedicalRecord, Medication)
//! - `ports`: Trait definitions for external operations (Storage, Notifier)
//! - `adapters`: Concrete implementations (text files, SQLite, Telegram, log sanitizer)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Runtime settings from TOML and environment
//! - `tui`: Terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use domain::{Appointment, MedicalRecord, Role, User};

/// Result type for Wardbook operations
pub type Result<T> = std::result::Result<T, WardbookError>;

/// Main error type for Wardbook
#[derive(Debug, thiserror::Error)]
pub enum WardbookError {
    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("{0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Invalid hospital ID, role or password")]
    InvalidCredentials,

    #[error("This action requires the {required} role")]
    Unauthorized { required: Role },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Internal state error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WardbookError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
