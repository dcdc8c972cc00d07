//! Network protocol engine for a small single-address-space kernel.
//!
//! Ethernet, ARP, IPv4, ICMP echo, UDP, a DHCP client and a TCP connection
//! engine, plus IPv6 neighbour discovery on the local link, all owned by one
//! [`net::stack::NetworkStack`] context object.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

//Networking infrastructure
pub mod net;

//Network drivers
pub mod drivers;

//Timers, cancellation and cooperative tasks
pub mod task;

pub use net::stack::{NetworkStack, SharedStack};
