// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission control: IPv4 allow/deny classification of scan targets.
//!
//! Deny wins over allow; an empty allow list permits everything not denied.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network in CIDR notation. A bare address parses as a /32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid IPv4 CIDR: {0}")]
pub struct CidrParseError(pub String);

impl Cidr {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, CidrParseError> {
        if prefix > 32 {
            return Err(CidrParseError(format!("{addr}/{prefix}")));
        }
        Ok(Self { addr, prefix })
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        };
        (u32::from(self.addr) & mask) == (u32::from(ip) & mask)
    }
}

impl FromStr for Cidr {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || CidrParseError(s.to_string());
        match s.split_once('/') {
            Some((addr, prefix)) => {
                let addr: Ipv4Addr = addr.parse().map_err(|_| parse_err())?;
                let prefix: u8 = prefix.parse().map_err(|_| parse_err())?;
                Cidr::new(addr, prefix)
            }
            None => {
                let addr: Ipv4Addr = s.parse().map_err(|_| parse_err())?;
                Ok(Self { addr, prefix: 32 })
            }
        }
    }
}

impl std::fmt::Display for Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl Serialize for Cidr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Static allow/deny lists evaluated against a target's IPv4 addresses
/// before any plugin runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccessPolicy {
    #[serde(default)]
    pub allow: Vec<Cidr>,
    #[serde(default)]
    pub deny: Vec<Cidr>,
}

impl AccessPolicy {
    /// Permit everything.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn permits(&self, ip: Ipv4Addr) -> bool {
        if self.deny.iter().any(|net| net.contains(ip)) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|net| net.contains(ip))
    }

    /// A target is scannable only if every one of its resolved addresses is
    /// permitted.
    pub fn permits_all<I: IntoIterator<Item = Ipv4Addr>>(&self, ips: I) -> bool {
        let mut any = false;
        for ip in ips {
            any = true;
            if !self.permits(ip) {
                return false;
            }
        }
        any
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
