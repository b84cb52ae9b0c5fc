//! Cloud provider modules for infrastructure provisioning.
//!
//! Currently supported:
//!
//! - **Waldur**: OpenStack tenants managed through a Waldur deployment
//!   (security groups)
//!
//! ## Example
//!
//! ```yaml
//! - name: Allow HTTP from the web tier
//!   waldur_os_security_group:
//!     access_token: "{{ waldur_token }}"
//!     api_url: https://waldur.example.com/api/
//!     tenant: VPC-1
//!     name: http
//!     description: HTTP access
//!     rules:
//!       - from_port: 80
//!         to_port: 80
//!         protocol: tcp
//!         remote_group: web
//!     state: present
//! ```

pub mod waldur;

pub use waldur::WaldurSecurityGroupModule;
