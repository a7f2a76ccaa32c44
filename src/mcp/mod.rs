// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP connectivity and assessment engine.
//!
//! Speaks the MCP handshake (`initialize` then `tools/list`) to servers
//! over either a child process's stdio or streamable HTTP, classifies
//! failures into a closed taxonomy, and turns the listed tool schemas into
//! token estimates.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Assessor                          │
//! │   transport choice · sweep · cache read/write · savings  │
//! └──────┬──────────────────┬──────────────────┬─────────────┘
//!        │                  │                  │
//!  ┌─────▼─────┐     ┌──────▼──────┐    ┌──────▼───────┐
//!  │   Stdio   │     │    HTTP     │───▶│ SDK validator│
//!  │ Transport │     │  Transport  │    │   (rmcp)     │
//!  └─────┬─────┘     └──┬───────┬──┘    └──────────────┘
//!        │              │       │
//!  ┌─────▼─────┐  ┌─────▼──┐ ┌──▼────────────┐
//!  │ registry  │  │ oauth  │ │ ConnectionTest│
//!  └───────────┘  └────────┘ └───────────────┘
//! ```
//!
//! The engine owns no persistent state: results go into an
//! [`AssessmentCache`] supplied by the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_assess::mcp::{Assessor, MemoryCache, ServerDescriptor};
//!
//! let assessor = Assessor::default();
//! let mut cache = MemoryCache::new();
//!
//! let server = ServerDescriptor::http("remote", "https://example.com/mcp")
//!     .with_header("Authorization", "Bearer ...");
//! let assessment = assessor.assess_into(&server, &mut cache).await;
//! ```

pub mod assess;
pub mod diagnostics;
pub mod error;
pub mod estimator;
pub mod http;
pub mod oauth;
pub mod protocol;
pub mod registry;
pub mod sdk;
pub mod stdio;
pub mod types;

pub use assess::{AssessmentCache, Assessor, MemoryCache};
pub use connection_test::{run_connection_test, ConnectionTester};
pub use error::McpError;
pub use estimator::{
    calculate_savings, calculate_savings_with, estimate_tokens, GuardStatus, SavingsPolicy,
    SavingsSummary, ServerSavings,
};
pub use http::HttpTransportClient;
pub use oauth::OAuthDiscovery;
pub use sdk::{RmcpValidator, SdkValidator};
pub use stdio::StdioTransportClient;
pub use types::*;
