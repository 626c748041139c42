//! Shell commands that start the tentacular proxy on a node.
//!
//! Every command first force-removes all containers on the host, then runs
//! the proxy image for the node's role, appends the caller's extra arguments
//! and finishes with a short sleep so the SSH session still sees output from
//! an immediate failure before it is torn down.

use crate::error::{FleetError, FleetResult};

/// Docker image that carries the proxy binary.
pub const PROXY_IMAGE: &str = "danoctavian/tentacular";

/// Port the master listens on for slave registrations.
pub const CONTROL_PORT: u16 = 6666;

/// Port every node exposes for proxied traffic.
pub const DATA_PORT: u16 = 8080;

/// Clause appended after the wrapped launch command.
pub const TRAILING_DELAY: &str = "; sleep 5";

const REMOVE_ALL_CONTAINERS: &str = "docker rm --force `docker ps -qa`;";

/// URL slaves use to reach the master's control port.
pub fn master_control_url(master_private_address: &str) -> String {
    format!("http://{master_private_address}:{CONTROL_PORT}")
}

/// Command for the master node.
pub fn build_master_command(extra_args: &str) -> String {
    let launch = format!(
        "{REMOVE_ALL_CONTAINERS}docker run -p {DATA_PORT}:{DATA_PORT} -p {CONTROL_PORT}:{CONTROL_PORT} \
         --name master --rm {PROXY_IMAGE} /go/bin/app --type=master"
    );
    wrap(&launch, extra_args)
}

/// Command for a slave node pointed at the master's private address.
///
/// Returns [`FleetError::Config`] for a blank address.
pub fn build_slave_command(master_private_address: &str, extra_args: &str) -> FleetResult<String> {
    let addr = master_private_address.trim();
    if addr.is_empty() {
        return Err(FleetError::Config("blank master private address".to_string()));
    }
    let launch = format!(
        "{REMOVE_ALL_CONTAINERS}docker run -p {DATA_PORT}:{DATA_PORT} --name slave --rm {PROXY_IMAGE} \
         /go/bin/app --masterurl=\"{}\"",
        master_control_url(addr)
    );
    Ok(wrap(&launch, extra_args))
}

fn wrap(launch: &str, extra_args: &str) -> String {
    format!("({launch} {extra_args}){TRAILING_DELAY}")
}
