//! Network stack implementation

pub mod wire;
pub mod checksum;
pub mod buffer;
pub mod config;
pub mod error;
pub mod ethernet;
pub mod arp;
pub mod ipv4;
pub mod ipv6;
pub mod icmp;
pub mod udp;
pub mod dhcp;
pub mod firewall;
pub mod tcp;
pub mod socket;
pub mod stack;

pub use core::net::Ipv4Addr;
pub use wire::MacAddr;
