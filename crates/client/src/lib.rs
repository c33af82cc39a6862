//! Nutanix API clients
//!
//! Typed clients for the Prism Central v3 intent API, Karbon (NKE), NDB and
//! the v4 Volumes/Prism APIs, plus the task-wait primitive shared by all of
//! them.

pub mod era;
pub mod error;
pub mod http;
pub mod karbon;
pub mod prism;
pub mod task;
pub mod v3;
pub mod volumes;

pub use error::{Error, Result};
pub use http::{AdditionalFilter, Credentials, HttpClient};
pub use task::{wait_for_state, Refresh, StateChangeConf};
