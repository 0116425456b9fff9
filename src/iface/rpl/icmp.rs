//! RPL control messages: validation of the received ones, and construction of the ones we send.

use super::of::ObjectiveFunction;
use super::rank::Rank;
use super::Rpl;

use crate::wire::rpl::{
    DodagConfiguration, MetricType, Target, TransitInformation,
    DAO_ACK_UNABLE_TO_ACCEPT,
};
use crate::wire::{
    HardwareAddress, Ipv6Address, Ipv6AddressExt, RplDao, RplDaoAck, RplDio, RplDis, RplRepr,
};

use super::lollipop::SequenceCounter;

impl Rpl {
    /// Process a RPL control message received from `src_addr` (link-layer address
    /// `src_lladdr`), sent to `dst_addr`.
    pub fn process_control_message(
        &mut self,
        src_addr: Ipv6Address,
        dst_addr: Ipv6Address,
        src_lladdr: HardwareAddress,
        repr: &RplRepr,
    ) {
        match repr {
            RplRepr::DodagInformationSolicitation(_) => {
                self.dis_input(src_addr, dst_addr, src_lladdr)
            }
            RplRepr::DodagInformationObject(dio) => {
                self.dio_input(src_addr, dst_addr, src_lladdr, dio)
            }
            RplRepr::DestinationAdvertisementObject(dao) => self.dao_input(src_addr, dao),
            RplRepr::DestinationAdvertisementObjectAck(ack) => self.dao_ack_input(src_addr, ack),
        }
    }

    fn dis_input(&mut self, src_addr: Ipv6Address, dst_addr: Ipv6Address, lladdr: HardwareAddress) {
        if !self.instance.used {
            net_warn!("dis_input: not in an instance yet, discard");
            return;
        }

        net_info!("received a DIS from {}", src_addr);
        self.process_dis(src_addr, lladdr, dst_addr.is_multicast());
    }

    fn dio_input(
        &mut self,
        src_addr: Ipv6Address,
        dst_addr: Ipv6Address,
        lladdr: HardwareAddress,
        dio: &RplDio,
    ) {
        if let Some(MetricType::Unknown(t)) = dio.metric_container.map(|mc| mc.metric_type()) {
            net_warn!("dio_input: unsupported DAG MC type {}, discard", t);
            return;
        }

        net_info!(
            "received a {}-DIO from {}, instance_id {}, DAG ID {}, version {}, dtsn {}, rank {}",
            if dst_addr.is_multicast() {
                "multicast"
            } else {
                "unicast"
            },
            src_addr,
            dio.rpl_instance_id,
            dio.dodag_id,
            dio.version_number,
            dio.dtsn,
            dio.rank
        );

        self.process_dio(src_addr, lladdr, dio);
    }

    fn dao_input(&mut self, src_addr: Ipv6Address, dao: &RplDao) {
        if !self.instance.used || self.instance.instance_id != dao.rpl_instance_id {
            net_warn!(
                "dao_input: unknown RPL instance {}, discard",
                dao.rpl_instance_id
            );
            return;
        }

        if let Some(dodag_id) = dao.dodag_id {
            if dodag_id != self.instance.dag.dag_id {
                net_warn!("dao_input: different DAG ID {}, discard", dodag_id);
                return;
            }
        }

        let lifetime = dao
            .transit_information
            .map(|t| t.path_lifetime)
            .unwrap_or(self.instance.default_lifetime);
        let target = dao.target.unwrap_or(Target {
            prefix_length: 0,
            prefix: Ipv6Address::UNSPECIFIED,
        });
        net_info!(
            "received a {}DAO from {}, seqno {}, lifetime {}, prefix {}, prefix length {}, parent {}",
            if lifetime == 0 { "No-path " } else { "" },
            src_addr,
            dao.sequence,
            lifetime,
            target.prefix,
            target.prefix_length,
            dao.parent_address().unwrap_or(Ipv6Address::UNSPECIFIED)
        );

        self.process_dao(src_addr, dao);
    }

    fn dao_ack_input(&mut self, src_addr: Ipv6Address, ack: &RplDaoAck) {
        if !self.instance.used || self.instance.instance_id != ack.rpl_instance_id {
            net_warn!("dao_ack_input: unknown instance, discard");
            return;
        }

        net_info!(
            "received a DAO-{} with seqno {} and status {} from {}",
            if ack.status < DAO_ACK_UNABLE_TO_ACCEPT {
                "ACK"
            } else {
                "NACK"
            },
            ack.sequence,
            ack.status,
            src_addr
        );

        self.process_dao_ack(ack.sequence, ack.status);
    }

    /// Send a DIS to `dst_addr`, or to all RPL nodes when `None`.
    pub(crate) fn dis_output(&mut self, dst_addr: Option<Ipv6Address>) {
        self.update_state();

        net_info!(
            "sending a DIS to {}",
            dst_addr.unwrap_or(crate::wire::ipv6::LINK_LOCAL_ALL_RPL_NODES)
        );
        self.send(
            dst_addr,
            RplRepr::DodagInformationSolicitation(RplDis::default()),
        );
    }

    /// Build the DIO advertising our DAG.
    pub(crate) fn dio(&self) -> RplDio {
        let leaf_only = self.config.leaf_only;
        let instance = &self.instance;
        let dag = &instance.dag;

        let rank = if leaf_only { Rank::INFINITE } else { dag.rank };
        let metric_container = Some(instance.mc)
            .filter(|mc| !leaf_only && mc.metric_type() != MetricType::None);

        RplDio {
            rpl_instance_id: instance.instance_id,
            version_number: dag.version,
            rank: rank.raw_value(),
            grounded: dag.grounded,
            mode_of_operation: instance.mop,
            dodag_preference: dag.preference,
            dtsn: instance.dtsn_out,
            dodag_id: dag.dag_id,
            dodag_configuration: DodagConfiguration {
                dio_interval_doublings: dag.trickle.doublings(),
                dio_interval_min: dag.trickle.i_min(),
                dio_redundancy_constant: dag.trickle.redundancy(),
                max_rank_increase: instance.max_rank_increase,
                minimum_hop_rank_increase: instance.min_hop_rank_increase,
                objective_code_point: instance.of.ocp(),
                default_lifetime: instance.default_lifetime,
                lifetime_unit: instance.lifetime_unit,
            },
            metric_container,
            prefix_information: dag.prefix_info,
        }
    }

    /// Send a DIO to `dst_addr`, or a multicast DIO when `None`.
    ///
    /// A leaf only answers: it never sends multicast DIOs, and advertises an infinite rank.
    pub(crate) fn dio_output(&mut self, dst_addr: Option<Ipv6Address>) {
        self.update_state();

        if self.config.leaf_only && dst_addr.is_none() {
            return;
        }

        let dio = self.dio();
        net_info!(
            "sending a {}-DIO with rank {} to {}",
            if dst_addr.is_some() {
                "unicast"
            } else {
                "multicast"
            },
            self.instance.dag.rank,
            dst_addr.unwrap_or(crate::wire::ipv6::LINK_LOCAL_ALL_RPL_NODES)
        );
        self.send(dst_addr, RplRepr::DodagInformationObject(dio));
    }

    /// Send a DAO for our global address to the root, through our preferred parent.
    ///
    /// A `lifetime` of 0 sends a No-Path DAO.
    pub(crate) fn dao_output(&mut self, lifetime: u8) {
        self.update_state();

        if !self.instance.used {
            net_warn!("dao_output: not in an instance, skip sending DAO");
            return;
        }

        let Some(parent) = self.instance.dag.preferred_parent else {
            net_warn!("dao_output: no preferred parent, skip sending DAO");
            return;
        };

        let prefix = self.global_address();
        let parent_ip = self.neighbor_ip_addr(&parent);
        let (Some(prefix), Some(parent_ip)) = (prefix, parent_ip) else {
            net_warn!("dao_output: node not ready to send a DAO");
            return;
        };
        if self.instance.mop == crate::wire::RplModeOfOperation::NoDownwardRoutesMaintained {
            net_warn!("dao_output: node not ready to send a DAO");
            return;
        }

        let dag = &self.instance.dag;
        // The parent is advertised with its address in the DODAG prefix.
        let parent_global =
            Ipv6Address::from_prefix_and_iid(&dag.dag_id, &parent_ip.interface_identifier());

        let dao = RplDao {
            rpl_instance_id: self.instance.instance_id,
            expect_ack: self.config.with_dao_ack && lifetime != 0,
            sequence: dag.dao_last_seqno,
            dodag_id: Some(dag.dag_id),
            target: Some(Target {
                prefix_length: 128,
                prefix,
            }),
            transit_information: Some(TransitInformation {
                external: false,
                path_control: 0,
                path_sequence: 0,
                path_lifetime: lifetime,
                parent_address: Some(parent_global),
            }),
        };

        net_info!(
            "sending a {}DAO seqno {}, tx count {}, lifetime {}, prefix {} to {}, parent {}",
            if lifetime == 0 { "No-path " } else { "" },
            dag.dao_last_seqno,
            dag.dao_transmissions,
            lifetime,
            prefix,
            dag.dag_id,
            parent_ip
        );

        let dag_id = dag.dag_id;
        self.send(Some(dag_id), RplRepr::DestinationAdvertisementObject(dao));
    }

    /// Send a DAO-ACK, or a DAO-NACK when `status` is 128 or more.
    pub(crate) fn dao_ack_output(
        &mut self,
        dst_addr: Ipv6Address,
        sequence: SequenceCounter,
        status: u8,
    ) {
        self.update_state();

        net_info!(
            "sending a DAO-{} seqno {} to {} with status {}",
            if status < DAO_ACK_UNABLE_TO_ACCEPT {
                "ACK"
            } else {
                "NACK"
            },
            sequence,
            dst_addr,
            status
        );

        let ack = RplDaoAck {
            rpl_instance_id: self.instance.instance_id,
            sequence,
            status,
            dodag_id: None,
        };
        self.send(
            Some(dst_addr),
            RplRepr::DestinationAdvertisementObjectAck(ack),
        );
    }
}
