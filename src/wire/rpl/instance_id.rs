/// A RPL Instance ID (RFC 6550 § 5.1).
///
/// Global instance IDs have the most significant bit cleared. Local instance IDs are scoped to
/// a DODAG root and carry the `D` flag in bit 6.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InstanceId {
    Global(u8),
    Local(u8),
}

impl From<u8> for InstanceId {
    fn from(val: u8) -> Self {
        const MASK: u8 = 0b0111_1111;

        if val & 0b1000_0000 == 0 {
            Self::Global(val & MASK)
        } else {
            Self::Local(val & MASK)
        }
    }
}

impl From<InstanceId> for u8 {
    fn from(val: InstanceId) -> Self {
        match val {
            InstanceId::Global(val) => val,
            InstanceId::Local(val) => 0b1000_0000 | val,
        }
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::Global(0)
    }
}

impl InstanceId {
    /// Return the real part of the ID.
    pub fn id(&self) -> u8 {
        match self {
            Self::Global(val) | Self::Local(val) => *val,
        }
    }

    /// Returns `true` when the DODAG ID is the destination address of the IPv6 packet.
    #[inline]
    pub fn dodag_is_destination(&self) -> bool {
        match self {
            Self::Global(_) => false,
            Self::Local(val) => ((val >> 6) & 0b1) == 0b1,
        }
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, InstanceId::Local(_))
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        matches!(self, InstanceId::Global(_))
    }
}

impl core::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(InstanceId::from(0x1e), InstanceId::Global(0x1e));
        assert_eq!(InstanceId::from(0x81), InstanceId::Local(1));
        assert_eq!(u8::from(InstanceId::Local(1)), 0x81);
        assert!(InstanceId::from(0xc0).dodag_is_destination());
        assert!(!InstanceId::Global(0x40).dodag_is_destination());
    }
}
