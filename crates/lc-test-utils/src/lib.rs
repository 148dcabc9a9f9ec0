//! # LC Test Utilities
//!
//! Shared test utilities for the Live Class Controller.
//!
//! This crate provides:
//! - Server test harness (`TestLcServer` for end-to-end tests)
//! - User and chat fixtures
//! - Timing helpers for asynchronous delivery
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestLcServer::spawn().await?;
//!     let (client, mut events) = server.connect().await?;
//!
//!     client.join_room("class-42", instructor("i-1")).await?;
//!     let roster = recv_within(&mut events.roster).await;
//!     assert_eq!(roster.user_ids(), vec!["i-1"]);
//!     Ok(())
//! }
//! ```

pub mod eventual;
pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use eventual::*;
pub use fixtures::*;
pub use server_harness::*;
