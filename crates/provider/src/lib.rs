//! Nutanix Terraform Provider
//!
//! This crate implements a Terraform provider for Nutanix Prism Central,
//! Karbon, Volumes and Nutanix Database Service using the Terraform Plugin
//! Protocol v6.

pub mod client;
pub mod config;
pub mod data_sources;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod state;
pub mod timeouts;
pub mod validation;

pub mod tfplugin6 {
    include!("generated/tfplugin6.rs");
}
