//! Shared test infrastructure.
//!
//! Provides a real-UDP stub agent and MIB fixtures.

// Not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod agent;
pub mod fixtures;

pub use agent::{Reply, TestAgent, TestAgentBuilder};
pub use fixtures::{
    COMMUNITY_RO, COMMUNITY_RW, interface_table, interfaces_subtree, nonexistent_oid, sys_contact,
    sys_descr, sys_name, sys_uptime, system_mib, system_subtree,
};

use snmp_manager::{Retry, Target};
use std::net::SocketAddr;
use std::time::Duration;

/// Read target for a local agent with a short timeout.
pub fn target(addr: SocketAddr) -> Target {
    Target::builder(addr.to_string())
        .community(COMMUNITY_RO)
        .timeout(Duration::from_millis(200))
        .retry(Retry::none())
        .build()
        .expect("valid target")
}

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
