//! Ethernet II framing
//!
//! Frame format: [Dest MAC (6)][Src MAC (6)][EtherType (2)][Payload (46-1500)]
//!
//! The FCS is left to the NIC. Outgoing frames are padded to the 60-byte
//! minimum so short ARP and TCP control frames are never runts.

use alloc::vec::Vec;
use core::fmt;

use crate::net::error::{DropReason, Layer};
use crate::net::wire::{self, MacAddr};

/// EtherType values (IEEE 802 numbers)
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;

/// Ethernet header size (dest + src + type)
pub const HEADER_SIZE: usize = 14;

/// Minimum frame size on the wire, excluding FCS
pub const MIN_FRAME_SIZE: usize = 60;

/// Maximum payload size (MTU)
pub const MAX_PAYLOAD_SIZE: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EthernetError {
    /// Frame is shorter than the 14-byte header
    FrameTooShort,
    /// Payload exceeds the 1500-byte MTU
    PayloadTooLarge,
}

impl fmt::Display for EthernetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EthernetError::FrameTooShort => write!(f, "Frame too short"),
            EthernetError::PayloadTooLarge => write!(f, "Payload too large"),
        }
    }
}

impl From<EthernetError> for DropReason {
    fn from(_: EthernetError) -> Self {
        DropReason::Malformed(Layer::Ethernet)
    }
}

/// Upper-layer protocol carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherKind {
    Ipv4,
    Arp,
    Ipv6,
    Unknown(u16),
}

impl EtherKind {
    /// Classify an EtherType. Byte-swapped values are accepted too, since some
    /// drivers hand the field over in host order.
    pub fn classify(ethertype: u16) -> Self {
        match ethertype {
            ETHERTYPE_IPV4 | 0x0008 => EtherKind::Ipv4,
            ETHERTYPE_ARP | 0x0608 => EtherKind::Arp,
            ETHERTYPE_IPV6 | 0xDD86 => EtherKind::Ipv6,
            other => EtherKind::Unknown(other),
        }
    }
}

/// Borrowed view of a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetFrame<'a> {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ethertype: u16,
    /// Everything after the header, link padding included
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, EthernetError> {
        if data.len() < HEADER_SIZE {
            return Err(EthernetError::FrameTooShort);
        }

        let dest_mac = MacAddr::read(data, 0).ok_or(EthernetError::FrameTooShort)?;
        let src_mac = MacAddr::read(data, 6).ok_or(EthernetError::FrameTooShort)?;
        let ethertype = wire::read_u16(data, 12).ok_or(EthernetError::FrameTooShort)?;

        Ok(Self {
            dest_mac,
            src_mac,
            ethertype,
            payload: &data[HEADER_SIZE..],
        })
    }

    pub fn kind(&self) -> EtherKind {
        EtherKind::classify(self.ethertype)
    }

    pub fn is_broadcast(&self) -> bool {
        self.dest_mac.is_broadcast()
    }
}

/// Build a frame ready for the wire, padded to [`MIN_FRAME_SIZE`].
pub fn build_frame(
    dest_mac: MacAddr,
    src_mac: MacAddr,
    ethertype: u16,
    payload: &[u8],
) -> Result<Vec<u8>, EthernetError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(EthernetError::PayloadTooLarge);
    }

    let mut frame = Vec::with_capacity((HEADER_SIZE + payload.len()).max(MIN_FRAME_SIZE));
    frame.extend_from_slice(dest_mac.as_bytes());
    frame.extend_from_slice(src_mac.as_bytes());
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);

    if frame.len() < MIN_FRAME_SIZE {
        frame.resize(MIN_FRAME_SIZE, 0);
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: MacAddr = MacAddr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);

    #[test]
    fn test_build_pads_to_minimum() {
        let frame = build_frame(MacAddr::BROADCAST, SRC, ETHERTYPE_ARP, &[1, 2, 3]).unwrap();
        assert_eq!(frame.len(), MIN_FRAME_SIZE);
        assert_eq!(&frame[0..6], &[0xFF; 6]);
        assert_eq!(&frame[6..12], SRC.as_bytes());
        assert_eq!(&frame[12..14], &[0x08, 0x06]);
        assert_eq!(&frame[14..17], &[1, 2, 3]);
        assert!(frame[17..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = [0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(
            build_frame(MacAddr::BROADCAST, SRC, ETHERTYPE_IPV4, &payload),
            Err(EthernetError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_swapped_ethertypes_accepted() {
        assert_eq!(EtherKind::classify(0x0008), EtherKind::Ipv4);
        assert_eq!(EtherKind::classify(0x0608), EtherKind::Arp);
        assert_eq!(EtherKind::classify(0xDD86), EtherKind::Ipv6);
        assert_eq!(EtherKind::classify(0x88CC), EtherKind::Unknown(0x88CC));
    }

    #[test]
    fn test_short_frame_rejected() {
        assert_eq!(EthernetFrame::parse(&[0u8; 13]), Err(EthernetError::FrameTooShort));
    }
}
