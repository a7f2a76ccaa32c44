// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! mcp-assess - MCP server connectivity and token-cost assessment.
//!
//! Connects to Model Context Protocol servers the way an MCP client would,
//! lists their tools, and estimates how many context tokens those tool
//! schemas cost. Failures are classified (auth, OAuth, connection,
//! timeout, SDK mismatch) with masked diagnostics for troubleshooting.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`mcp`] - The assessment engine: transports, OAuth detection, SDK
//!   cross-validation, token estimation, connection tests
//! - [`config`] - Configuration loading and merging, server list files
//! - [`error`] - Error types and result aliases
//! - [`telemetry`] - Tracing setup, assessment spans and metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_assess::config::AssessConfig;
//! use mcp_assess::mcp::{Assessor, ServerDescriptor};
//!
//! let assessor = Assessor::new(AssessConfig::default());
//! let server = ServerDescriptor::stdio("filesystem", "npx")
//!     .with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]);
//!
//! match assessor.assess(&server).await.into_result() {
//!     Ok(metrics) => println!("{} tools, ~{} tokens", metrics.tool_count, metrics.estimated_tokens),
//!     Err(error) => eprintln!("{}", error),
//! }
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::AssessConfig;
pub use error::{ConfigError, Result};
pub use mcp::{
    Assessment, AssessmentCache, AssessmentError, Assessor, ConnectionTestResult, ErrorKind,
    MemoryCache, ServerDescriptor, TokenMetrics,
};

/// Crate version, sent as `clientInfo.version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default `clientInfo.name`.
pub const CLIENT_NAME: &str = "mcp-assess";
