use super::consts::{DEFAULT_ROOT_PREFIX, ROOT_PREFIX_LEN};
use super::Rpl;

use crate::iface::addr::AddressOrigin;
use crate::wire::rpl::PrefixFlags;
use crate::wire::{Ipv6Address, Ipv6AddressExt, Ipv6Cidr};
use crate::{Error, Result};

impl Rpl {
    /// Set the prefix of the DODAG this node will root, and assign the root address in it.
    ///
    /// Without a prefix, `fd00::/64` is used. Without an interface identifier, the one of the
    /// link-layer address is used.
    pub fn root_set_prefix(
        &mut self,
        prefix: Option<Ipv6Address>,
        iid: Option<[u8; 8]>,
    ) -> Result<()> {
        let prefix = Ipv6Address::from(prefix.unwrap_or(DEFAULT_ROOT_PREFIX).mask(ROOT_PREFIX_LEN));
        let iid = iid.unwrap_or_else(|| self.iid());
        let addr = Ipv6Address::from_prefix_and_iid(&prefix, &iid);

        self.root_prefix = Some(prefix);
        if self
            .addresses
            .add(Ipv6Cidr::new(addr, ROOT_PREFIX_LEN), AddressOrigin::Autoconf)
            .is_err()
        {
            net_warn!("address table full, could not add the root address {}", addr);
            return Err(Error::NoGlobalAddress);
        }
        net_info!("root address {}", addr);
        Ok(())
    }

    /// Start a new DODAG rooted at the global address of this node.
    pub fn root_start(&mut self) -> Result<()> {
        let prefix = self.root_prefix.unwrap_or(DEFAULT_ROOT_PREFIX);
        let Some(root_addr) = self
            .addresses
            .global_address(Some((&prefix, ROOT_PREFIX_LEN)))
            .or_else(|| self.addresses.global_address(None))
        else {
            net_warn!("failed to create a new RPL DAG, no global address");
            return Err(Error::NoGlobalAddress);
        };

        self.dag_init_root(
            self.config.instance_id,
            root_addr,
            &prefix,
            ROOT_PREFIX_LEN,
            PrefixFlags::AUTONOMOUS,
        )?;
        self.update_state();
        net_info!("created a new RPL DAG");
        Ok(())
    }
}
