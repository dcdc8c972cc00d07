//! Ingress packet filter
//!
//! An ordered table of up to [`MAX_RULES`] rules. Zero-valued fields are
//! wildcards, the first enabled rule that matches decides, and packets that
//! match nothing get the table's default action.

use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

pub const MAX_RULES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirewallRule {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    /// 1=ICMP, 6=TCP, 17=UDP, 0=any
    pub protocol: u8,
    pub action: FirewallAction,
    pub enabled: bool,
}

impl FirewallRule {
    /// Rule matching everything; narrow it with the builder methods.
    pub fn any(action: FirewallAction) -> Self {
        Self {
            src_ip: Ipv4Addr::UNSPECIFIED,
            dst_ip: Ipv4Addr::UNSPECIFIED,
            src_port: 0,
            dst_port: 0,
            protocol: 0,
            action,
            enabled: true,
        }
    }

    pub fn src_ip(mut self, ip: Ipv4Addr) -> Self {
        self.src_ip = ip;
        self
    }

    pub fn dst_ip(mut self, ip: Ipv4Addr) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    fn matches(&self, packet: &PacketInfo) -> bool {
        (self.src_ip.is_unspecified() || self.src_ip == packet.src_ip)
            && (self.dst_ip.is_unspecified() || self.dst_ip == packet.dst_ip)
            && (self.src_port == 0 || self.src_port == packet.src_port)
            && (self.dst_port == 0 || self.dst_port == packet.dst_port)
            && (self.protocol == 0 || self.protocol == packet.protocol)
    }
}

/// Addressing summary of an inbound packet. Ports are 0 for ICMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallError {
    TableFull,
    NoSuchRule(usize),
}

impl fmt::Display for FirewallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirewallError::TableFull => write!(f, "firewall table full ({} rules)", MAX_RULES),
            FirewallError::NoSuchRule(index) => write!(f, "no firewall rule {}", index),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Firewall {
    rules: Vec<FirewallRule>,
    default_action: FirewallAction,
}

impl Firewall {
    pub fn new(default_action: FirewallAction) -> Self {
        Self {
            rules: Vec::with_capacity(MAX_RULES),
            default_action,
        }
    }

    /// Append a rule. Returns its index.
    pub fn add_rule(&mut self, rule: FirewallRule) -> Result<usize, FirewallError> {
        if self.rules.len() >= MAX_RULES {
            return Err(FirewallError::TableFull);
        }
        self.rules.push(rule);
        log::info!("Firewall rule {} added: {:?}", self.rules.len() - 1, rule.action);
        Ok(self.rules.len() - 1)
    }

    pub fn enable_rule(&mut self, index: usize) -> Result<(), FirewallError> {
        self.set_enabled(index, true)
    }

    pub fn disable_rule(&mut self, index: usize) -> Result<(), FirewallError> {
        self.set_enabled(index, false)
    }

    fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), FirewallError> {
        let rule = self
            .rules
            .get_mut(index)
            .ok_or(FirewallError::NoSuchRule(index))?;
        rule.enabled = enabled;
        Ok(())
    }

    pub fn set_default_action(&mut self, action: FirewallAction) {
        self.default_action = action;
    }

    pub fn rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    /// First enabled match decides; otherwise the default action.
    pub fn check(&self, packet: &PacketInfo) -> FirewallAction {
        let action = self
            .rules
            .iter()
            .filter(|rule| rule.enabled)
            .find(|rule| rule.matches(packet))
            .map_or(self.default_action, |rule| rule.action);

        if action == FirewallAction::Deny {
            log::warn!(
                "Firewall: packet blocked {}:{} -> {}:{} proto {}",
                packet.src_ip,
                packet.src_port,
                packet.dst_ip,
                packet.dst_port,
                packet.protocol
            );
        }
        action
    }

    pub fn allows(&self, packet: &PacketInfo) -> bool {
        self.check(packet) == FirewallAction::Allow
    }
}

impl Default for Firewall {
    fn default() -> Self {
        Self::new(FirewallAction::Allow)
    }
}
