//! Service network constants.

/// Prefix of the /24 cluster addresses are allocated from.
pub const CLUSTER_IP_PREFIX: &str = "10.43.0";

/// Lowest host octet handed out (.0 is the network, .1 the gateway).
pub const CLUSTER_IP_FIRST_HOST: u8 = 2;

/// Number of host octets available for allocation.
pub const CLUSTER_IP_POOL_SIZE: u8 = 250;
