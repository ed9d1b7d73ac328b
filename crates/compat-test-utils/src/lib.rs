//! Shared test utilities for the ansible-compat workspace.
//!
//! This crate provides fixtures that stand in for the external automation
//! runtime. It is a dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`toolchain`] fake `ansible`, `ansible-config`, `ansible-galaxy`,
//!   `ansible-playbook` and `python3` executables that record every
//!   invocation
//! - [`project`] [`TestProject`] builder for project directory layouts

pub mod project;
pub mod toolchain;

pub use project::TestProject;
pub use toolchain::{FakeToolchain, Invocation};
