//! Runtime configuration (spec.md §3 "Configuration (recognized options)").

use std::time::Duration;

/// Every tunable the pktio worker and broker need at construction time.
/// Built with consuming `with_*` methods, in the reference driver's style.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) read_buf_len: usize,
    pub(crate) write_buf_len: usize,
    pub(crate) recv_timeout: Duration,
    pub(crate) send_timeout: Duration,
    pub(crate) max_prefix_len: usize,
    pub(crate) max_cmd_len: usize,
    pub(crate) shutdown_poll: Duration,
    /// Overall deadline `request_with_callback` waits for a terminator
    /// (spec.md §4.5), distinct from the per-`recv`/`send` call timeouts.
    pub(crate) command_timeout: Duration,
    /// Skips the `CGREG?` query in `get_service_status` (spec.md §3
    /// "NO_GSM_NETWORK compile-time switch"). Defaults to the
    /// `no-gsm-network` Cargo feature so a build-time choice is still
    /// available, but can be overridden per `Config` instance.
    pub(crate) no_gsm_network: bool,
    /// Carried for API compatibility with the external socket layer
    /// (spec.md §3); this crate does not implement sockets.
    pub(crate) max_sockets: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            read_buf_len: 1024,
            write_buf_len: 256,
            recv_timeout: Duration::from_millis(1000),
            send_timeout: Duration::from_millis(1000),
            max_prefix_len: 32,
            max_cmd_len: 256,
            shutdown_poll: Duration::from_millis(100),
            command_timeout: Duration::from_secs(10),
            no_gsm_network: cfg!(feature = "no-gsm-network"),
            max_sockets: 6,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_buf_len(self, read_buf_len: usize) -> Self {
        Config { read_buf_len, ..self }
    }

    pub fn with_write_buf_len(self, write_buf_len: usize) -> Self {
        Config { write_buf_len, ..self }
    }

    pub fn with_recv_timeout(self, recv_timeout: Duration) -> Self {
        Config { recv_timeout, ..self }
    }

    pub fn with_send_timeout(self, send_timeout: Duration) -> Self {
        Config { send_timeout, ..self }
    }

    pub fn with_max_prefix_len(self, max_prefix_len: usize) -> Self {
        Config { max_prefix_len, ..self }
    }

    pub fn with_max_cmd_len(self, max_cmd_len: usize) -> Self {
        Config { max_cmd_len, ..self }
    }

    pub fn with_command_timeout(self, command_timeout: Duration) -> Self {
        Config { command_timeout, ..self }
    }

    pub fn with_no_gsm_network(self, no_gsm_network: bool) -> Self {
        Config { no_gsm_network, ..self }
    }

    pub fn with_max_sockets(self, max_sockets: usize) -> Self {
        Config { max_sockets, ..self }
    }
}
