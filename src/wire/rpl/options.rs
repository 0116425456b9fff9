//! High-level representations of the RPL control message options used by the core.

use crate::iface::rpl::consts;
use crate::wire::ipv6::Address;

/// A high-level representation of a RPL DODAG Configuration Option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DodagConfiguration {
    pub dio_interval_doublings: u8,
    pub dio_interval_min: u8,
    pub dio_redundancy_constant: u8,
    pub max_rank_increase: u16,
    pub minimum_hop_rank_increase: u16,
    pub objective_code_point: u16,
    pub default_lifetime: u8,
    pub lifetime_unit: u16,
}

impl Default for DodagConfiguration {
    fn default() -> Self {
        Self {
            dio_interval_doublings: consts::DEFAULT_DIO_INTERVAL_DOUBLINGS,
            dio_interval_min: consts::DEFAULT_DIO_INTERVAL_MIN,
            dio_redundancy_constant: consts::DEFAULT_DIO_REDUNDANCY_CONSTANT,
            max_rank_increase: consts::DEFAULT_MAX_RANK_INCREASE,
            minimum_hop_rank_increase: consts::DEFAULT_MIN_HOP_RANK_INCREASE,
            objective_code_point: consts::OCP_MRHOF,
            default_lifetime: consts::DEFAULT_ROUTE_LIFETIME,
            lifetime_unit: consts::DEFAULT_ROUTE_LIFETIME_UNIT,
        }
    }
}

bitflags::bitflags! {
    /// Flags of a Prefix Information Option (RFC 4861 § 4.6.2).
    pub struct PrefixFlags: u8 {
        const ON_LINK = 0x80;
        const AUTONOMOUS = 0x40;
        const ROUTER_ADDRESS = 0x20;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PrefixFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u8:#x}", self.bits());
    }
}

/// A high-level representation of a RPL Prefix Information Option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PrefixInformation {
    pub prefix_length: u8,
    pub flags: PrefixFlags,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
    pub prefix: Address,
}

impl PrefixInformation {
    /// A prefix is usable for address autoconfiguration when its length is in `1..=128` and the
    /// autonomous flag is set.
    pub fn is_autoconfigurable(&self) -> bool {
        (1..=128).contains(&self.prefix_length) && self.flags.contains(PrefixFlags::AUTONOMOUS)
    }
}

enum_with_unknown! {
    /// Routing metric and constraint object types (RFC 6551 § 6).
    pub enum MetricType(u8) {
        None = 0,
        Energy = 2,
        Etx = 7,
    }
}

enum_with_unknown! {
    /// Node energy types of the Node Energy object (RFC 6551 § 3.2).
    pub enum EnergyType(u8) {
        Mains = 0,
        Battery = 1,
        Scavenging = 2,
    }
}

/// Shift of the node energy type inside the energy object flags.
pub const ENERGY_TYPE_SHIFT: u8 = 1;

/// Additive aggregation of a routing metric.
pub const AGGREGATION_ADDITIVE: u8 = 0;

/// The metric object carried in a DAG Metric Container.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MetricObject {
    None,
    Etx(u16),
    Energy { flags: u8, estimation: u8 },
    Unknown(u8),
}

impl MetricObject {
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricObject::None => MetricType::None,
            MetricObject::Etx(_) => MetricType::Etx,
            MetricObject::Energy { .. } => MetricType::Energy,
            MetricObject::Unknown(t) => MetricType::Unknown(*t),
        }
    }

    /// Build a node energy object for a node of the given energy type.
    pub fn energy(energy_type: EnergyType, estimation: u8) -> Self {
        MetricObject::Energy {
            flags: u8::from(energy_type) << ENERGY_TYPE_SHIFT,
            estimation,
        }
    }
}

/// A high-level representation of a DAG Metric Container option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MetricContainer {
    pub flags: u8,
    pub aggregation: u8,
    pub precedence: u8,
    pub object: MetricObject,
}

impl MetricContainer {
    pub const NONE: Self = Self {
        flags: 0,
        aggregation: AGGREGATION_ADDITIVE,
        precedence: 0,
        object: MetricObject::None,
    };

    pub fn metric_type(&self) -> MetricType {
        self.object.metric_type()
    }
}

impl Default for MetricContainer {
    fn default() -> Self {
        Self::NONE
    }
}

/// A high-level representation of a RPL Target Option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Target {
    pub prefix_length: u8,
    pub prefix: Address,
}

/// A high-level representation of a RPL Transit Information Option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TransitInformation {
    pub external: bool,
    pub path_control: u8,
    pub path_sequence: u8,
    pub path_lifetime: u8,
    pub parent_address: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_autoconfiguration() {
        let mut pio = PrefixInformation {
            prefix_length: 64,
            flags: PrefixFlags::AUTONOMOUS,
            valid_lifetime: u32::MAX,
            preferred_lifetime: u32::MAX,
            prefix: Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 0),
        };
        assert!(pio.is_autoconfigurable());

        pio.flags = PrefixFlags::ON_LINK;
        assert!(!pio.is_autoconfigurable());

        pio.flags = PrefixFlags::AUTONOMOUS | PrefixFlags::ON_LINK;
        pio.prefix_length = 0;
        assert!(!pio.is_autoconfigurable());
    }

    #[test]
    fn energy_object_flags() {
        assert_eq!(
            MetricObject::energy(EnergyType::Battery, 3),
            MetricObject::Energy {
                flags: 0b10,
                estimation: 3
            }
        );
        assert_eq!(MetricObject::Unknown(4).metric_type(), MetricType::Unknown(4));
        assert_eq!(MetricContainer::default().metric_type(), MetricType::None);
    }
}
