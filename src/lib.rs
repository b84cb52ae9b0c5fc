//! # waldur-os - OpenStack security groups through Waldur
//!
//! waldur-os manages OpenStack security groups of a Waldur tenant from an
//! automation task. A task names the tenant, the group and the rules it should
//! have; the module creates the group, brings its description and rules up to
//! date, or deletes it, and reports whether anything changed.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 waldur_os_security_group binary                     │
//! │        (arguments file + settings -> module params + context)       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Module Registry                            │
//! │                   (waldur_os_security_group)                        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │ Rule validation │   │   Remote group      │   │ State reconciliation│
//! │ (cidr/ethertype │   │   resolution        │   │ (create, update,    │
//! │  /direction)    │   │                     │   │  delete)            │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Waldur REST API (HttpWaldurClient)                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use waldur_os::prelude::*;
//! use serde_json::json;
//!
//! let mut params = ModuleParams::new();
//! params.insert("api_url".into(), json!("https://waldur.example.com/api/"));
//! params.insert("access_token".into(), json!("b83557fd8e2066e98f27dee8f3b3433cdc4183ce"));
//! params.insert("tenant".into(), json!("VPC #1"));
//! params.insert("name".into(), json!("web"));
//! params.insert("rules".into(), json!([{"from_port": 80, "to_port": 80, "protocol": "tcp", "cidr": "0.0.0.0/0"}]));
//!
//! let output = ModuleRegistry::with_builtins().execute(
//!     "waldur_os_security_group",
//!     &params,
//!     &ModuleContext::default(),
//! )?;
//! println!("{}", output.msg);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error handling
    pub use crate::error::{Error, Result};

    // Module system
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleResult, ParamExt,
    };

    // Waldur
    pub use crate::modules::cloud::waldur::{
        ClientError, HttpWaldurClient, SecurityGroupClient, SecurityGroupRule,
        WaldurSecurityGroupModule,
    };

    // Configuration
    pub use crate::config::Settings;
}

/// Error types and result aliases for waldur-os operations.
pub mod error;

/// Settings loaded from configuration files and the environment.
pub mod config;

/// Reading module parameters from an arguments file.
pub mod invocation;

/// Module system: the [`Module`](modules::Module) trait, its registry and
/// the Waldur security group module.
pub mod modules;

/// Rendering module results as JSON or human-readable lines.
pub mod output;
