//! # Academy Test Utilities
//!
//! Shared test utilities for the academy service.
//!
//! This crate provides:
//! - RSA key fixtures and JWKS documents (`TestRsaKey`, `jwks_json`)
//! - Access token builder (`AccessTokenBuilder`)
//! - Server test harness (`TestAcademyServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use academy_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: SqlitePool) -> Result<()> {
//!     let server = TestAcademyServer::spawn(pool).await?;
//!     let token = AccessTokenBuilder::new()
//!         .for_subject("member-guid")
//!         .sign(&TestRsaKey::primary());
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/members", server.url()))
//!         .header("Cf-Access-Jwt-Assertion", token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
