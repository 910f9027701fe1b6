//! Core types and utilities for labfleet.
//!
//! This crate provides the foundational types used throughout the labfleet
//! platform:
//!
//! - **Identifiers**: Strongly-typed integer IDs for users, agents, and bookings
//! - **Memory sizes**: Parsing of request memory strings (`"4g"`, `"512m"`)
//!   into whole gigabytes for capacity accounting
//!
//! # Example
//!
//! ```
//! use labfleet_core::{BookingId, parse_mem_gb};
//!
//! let booking_id = BookingId::new(42);
//! assert_eq!(booking_id.as_u64(), 42);
//!
//! // Capacity math is done in whole GB; megabyte requests round up.
//! assert_eq!(parse_mem_gb("4g").unwrap(), 4);
//! assert_eq!(parse_mem_gb("512m").unwrap(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod mem;
pub mod role;

pub use ids::{AgentId, BookingId, UserId};
pub use mem::{parse_mem_gb, MemParseError};
pub use role::Role;
