//! Cache key generation and management

use crate::models::Network;
use std::fmt;

/// A structured cache key that can be converted to a string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Counterparty chain behind a local IBC channel end
    ChannelChain {
        network: Network,
        port: String,
        channel: String,
    },
    /// Validator behind a consensus (attestor) address
    Attestor { network: Network, address: String },
}

impl CacheKey {
    pub fn channel_chain(network: Network, port: &str, channel: &str) -> Self {
        Self::ChannelChain {
            network,
            port: port.to_string(),
            channel: channel.to_string(),
        }
    }

    /// Attestor addresses are hex; case differs between endpoints.
    pub fn attestor(network: Network, address: &str) -> Self {
        Self::Attestor {
            network,
            address: address.to_ascii_uppercase(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelChain { network, port, channel } => {
                write!(f, "chan:{}:{}:{}", network, port, channel)
            }
            Self::Attestor { network, address } => write!(f, "val:{}:{}", network, address),
        }
    }
}
