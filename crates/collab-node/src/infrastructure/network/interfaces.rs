//! Local interface enumeration backed by `get_if_addrs`.

use std::io;
use std::net::IpAddr;

use collab_core::LocalAddressSource;
use tracing::debug;

/// Reads the host's interface table on every call.
///
/// Loopback addresses are included; the configured subnet decides which
/// address is used, so `127.0.0.0/8` works for single-host experiments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl LocalAddressSource for SystemInterfaces {
    fn unicast_addresses(&self) -> io::Result<Vec<IpAddr>> {
        let addresses: Vec<IpAddr> = get_if_addrs::get_if_addrs()?
            .into_iter()
            .map(|iface| {
                debug!("interface {} has {}", iface.name, iface.ip());
                iface.ip()
            })
            .collect();
        Ok(addresses)
    }
}
