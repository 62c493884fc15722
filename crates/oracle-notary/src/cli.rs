//! Process-start-only arguments. Everything that shapes a *request*'s
//! outcome lives in the embedded config asset (`infra::config`); `clap`'s
//! `env` feature here only covers where the process binds its listeners,
//! which does not affect the enclave measurement.

use std::net::SocketAddr;

#[derive(Debug, clap::Parser)]
pub struct Args {
    /// Address the notarization API binds to.
    #[clap(long, env, default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,

    /// Address the `/metrics` endpoint binds to, kept off the public
    /// listener.
    #[clap(long, env, default_value = "0.0.0.0:8001")]
    pub metrics_addr: SocketAddr,
}

impl std::fmt::Display for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bind_addr: {}, ", self.bind_addr)?;
        write!(f, "metrics_addr: {}", self.metrics_addr)
    }
}
