//! Configuration structs for the yamlfig demo application.
//!
//! Every field is required: run `config gen -o demo.yaml` for a starting
//! file, then fill it in or override keys from the environment.
//!
//! # Env var mapping
//!
//! With the prefix `YAMLFIG_DEMO`, single underscores separate segments and
//! field names containing `_` still match:
//!
//! | Env var                                    | Config key                       |
//! |--------------------------------------------|----------------------------------|
//! | `YAMLFIG_DEMO_PROTOCOL`                    | `protocol`                       |
//! | `YAMLFIG_DEMO_HOST_NETWORK_MIN_TIMEOUT`    | `host_network.min_timeout`       |
//! | `YAMLFIG_DEMO_CLIENTS_ALPHA_ADDRESS`       | `clients.alpha.address`          |
//! | `YAMLFIG_DEMO_AUTH_TOKEN`                  | `auth_token`                     |

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(yamlfig::Config, Serialize, Deserialize, Debug, Default)]
pub struct DemoConfig {
    /// Wire protocol, e.g. "tcp" or "udp".
    #[config(default = "tcp")]
    pub protocol: String,

    /// Address to listen on.
    #[config(default = "127.0.0.1:7900")]
    pub address: String,

    /// Address announced to peers. `null` to use `address`.
    pub fixed_public_address: Option<String>,

    /// Token presented to clients.
    #[config(secret)]
    pub auth_token: String,

    pub host_network: HostNetwork,

    /// Known clients by name.
    pub clients: HashMap<String, Client>,
}

#[derive(yamlfig::Config, Serialize, Deserialize, Debug, Default)]
pub struct HostNetwork {
    /// Minimum timeout in milliseconds.
    #[config(default = 10)]
    pub min_timeout: u32,
    /// Maximum timeout in milliseconds.
    #[config(default = 2000)]
    pub max_timeout: u32,
    #[config(default = 2)]
    pub timeout_mult: u32,
    #[config(default = true)]
    pub sign_messages: bool,
    /// Session lifetime in seconds.
    #[config(default = 5)]
    pub handshake_session_ttl: i32,
}

#[derive(yamlfig::Config, Serialize, Deserialize, Debug, Default)]
pub struct Client {
    pub id: u64,
    pub address: String,
}
