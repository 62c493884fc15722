//! Concrete adapters: everything that touches a socket, the filesystem, or
//! an OS-level crypto primitive lives here, behind the capability traits
//! `domain` declares. `domain` never imports from `infra` except through
//! those traits.

pub mod config;
pub mod enclave_device;
pub mod hasher;
pub mod html;
pub mod http_client;
pub mod metrics;
pub mod signer;
