use super::InstanceId;
use crate::wire::{Error, Result};
use byteorder::{ByteOrder, NetworkEndian};

mod field {
    use crate::wire::field::*;

    pub const FLAGS: usize = 0;
    pub const INSTANCE_ID: usize = 1;
    pub const SENDER_RANK: Field = 2..4;
}

/// The IPv6 option type of the RPL option (RFC 6553 § 6).
pub const OPTION_TYPE: u8 = 0x63;

/// Length of the RPL option data without sub-TLVs.
pub const OPTION_DATA_LEN: u8 = 4;

/// Length of a Hop-by-Hop extension header carrying only the RPL option.
pub const HEADER_LEN: usize = 8;

const FLAG_DOWN: u8 = 0b1000_0000;
const FLAG_RANK_ERROR: u8 = 0b0100_0000;
const FLAG_FORWARDING_ERROR: u8 = 0b0010_0000;

/// A read/write wrapper around a RPL Packet Information send with
/// an IPv6 Hop-by-Hop option, defined in RFC6553.
/// ```txt
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///                                 +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///                                 |  Option Type  |  Opt Data Len |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |O|R|F|0|0|0|0|0| RPLInstanceID |          SenderRank           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Create a raw octet buffer with a RPL Hop-by-Hop option structure.
    #[inline]
    pub fn new_unchecked(buffer: T) -> Self {
        Self { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    #[inline]
    pub fn new_checked(buffer: T) -> Result<Self> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error)` if the buffer is not exactly the option data length.
    #[inline]
    pub fn check_len(&self) -> Result<()> {
        if self.buffer.as_ref().len() == OPTION_DATA_LEN as usize {
            Ok(())
        } else {
            Err(Error)
        }
    }

    /// Consume the packet, returning the underlying buffer.
    #[inline]
    pub fn into_inner(self) -> T {
        self.buffer
    }

    #[inline]
    fn flags(&self) -> u8 {
        self.buffer.as_ref()[field::FLAGS]
    }

    /// Return the Down field.
    #[inline]
    pub fn is_down(&self) -> bool {
        self.flags() & FLAG_DOWN != 0
    }

    /// Return the Rank-Error field.
    #[inline]
    pub fn has_rank_error(&self) -> bool {
        self.flags() & FLAG_RANK_ERROR != 0
    }

    /// Return the Forwarding-Error field.
    #[inline]
    pub fn has_forwarding_error(&self) -> bool {
        self.flags() & FLAG_FORWARDING_ERROR != 0
    }

    /// Return the Instance ID field.
    #[inline]
    pub fn rpl_instance_id(&self) -> InstanceId {
        InstanceId::from(self.buffer.as_ref()[field::INSTANCE_ID])
    }

    /// Return the Sender Rank field.
    #[inline]
    pub fn sender_rank(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[field::SENDER_RANK])
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    #[inline]
    fn set_flag(&mut self, flag: u8, value: bool) {
        let raw = &mut self.buffer.as_mut()[field::FLAGS];
        if value {
            *raw |= flag;
        } else {
            *raw &= !flag;
        }
    }

    /// Set the Down field.
    #[inline]
    pub fn set_is_down(&mut self, value: bool) {
        self.set_flag(FLAG_DOWN, value)
    }

    /// Set the Rank-Error field.
    #[inline]
    pub fn set_has_rank_error(&mut self, value: bool) {
        self.set_flag(FLAG_RANK_ERROR, value)
    }

    /// Set the Forwarding-Error field.
    #[inline]
    pub fn set_has_forwarding_error(&mut self, value: bool) {
        self.set_flag(FLAG_FORWARDING_ERROR, value)
    }

    /// Set the Instance ID field.
    #[inline]
    pub fn set_rpl_instance_id(&mut self, value: u8) {
        self.buffer.as_mut()[field::INSTANCE_ID] = value;
    }

    /// Set the Sender Rank field.
    #[inline]
    pub fn set_sender_rank(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[field::SENDER_RANK], value)
    }
}

/// A high-level representation of an RPL Hop-by-Hop Option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HopByHopOption {
    pub down: bool,
    pub rank_error: bool,
    pub forwarding_error: bool,
    pub instance_id: InstanceId,
    pub sender_rank: u16,
}

impl HopByHopOption {
    /// Parse an RPL Hop-by-Hop Option and return a high-level representation.
    pub fn parse<T>(opt: &Packet<&T>) -> Self
    where
        T: AsRef<[u8]> + ?Sized,
    {
        Self {
            down: opt.is_down(),
            rank_error: opt.has_rank_error(),
            forwarding_error: opt.has_forwarding_error(),
            instance_id: opt.rpl_instance_id(),
            sender_rank: opt.sender_rank(),
        }
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub const fn buffer_len(&self) -> usize {
        OPTION_DATA_LEN as usize
    }

    /// Emit a high-level representation into an RPL Hop-by-Hop Option.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, opt: &mut Packet<&mut T>) {
        opt.set_is_down(self.down);
        opt.set_has_rank_error(self.rank_error);
        opt.set_has_forwarding_error(self.forwarding_error);
        opt.set_rpl_instance_id(self.instance_id.into());
        opt.set_sender_rank(self.sender_rank);
    }
}

impl core::fmt::Display for HopByHopOption {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "down={} rank_error={} forw_error={} IID={} sender_rank={}",
            self.down, self.rank_error, self.forwarding_error, self.instance_id, self.sender_rank
        )
    }
}

/// The Hop-by-Hop extension header of a packet as seen by the RPL core.
///
/// The length fields are kept so that headers written by other stacks can be validated
/// before the option is trusted.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HopByHopHeader {
    /// Header length in 8-octet units, not including the first 8 octets.
    pub header_len: u8,
    pub option_type: u8,
    pub option_data_len: u8,
    pub option: HopByHopOption,
}

impl HopByHopHeader {
    /// Build the header a node inserts when originating a packet.
    pub const fn new(option: HopByHopOption) -> Self {
        Self {
            header_len: ((HEADER_LEN - 8) / 8) as u8,
            option_type: OPTION_TYPE,
            option_data_len: OPTION_DATA_LEN,
            option,
        }
    }

    /// Parse a complete 8-octet Hop-by-Hop header (next header, length, RPL option).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != HEADER_LEN {
            return Err(Error);
        }

        let packet = Packet::new_checked(&data[4..])?;
        Ok(Self {
            header_len: data[1],
            option_type: data[2],
            option_data_len: data[3],
            option: HopByHopOption::parse(&packet),
        })
    }

    /// Query whether the header carries a RPL option of the expected size.
    pub fn is_well_formed(&self) -> bool {
        self.header_len as usize == (HEADER_LEN - 8) / 8
            && self.option_type == OPTION_TYPE
            && self.option_data_len == OPTION_DATA_LEN
    }

    /// Query whether the header carries a RPL option, whatever its size.
    pub fn is_rpl(&self) -> bool {
        self.option_type == OPTION_TYPE
    }
}
