//! CC1101 Bridge Simulation Library
//!
//! Provides [`VirtualBridge`], an in-memory stand-in for the serial bridge
//! that answers INIT, STATUS_QUERY and TX_BLOCK envelopes, so the link can be
//! exercised without hardware.
//!
//! # Example
//!
//! ```rust
//! use cc_link::Transport;
//! use cc_protocol::RadioLinkConfig;
//! use cc_sim::VirtualBridge;
//!
//! let mut link = Transport::new(VirtualBridge::new());
//! link.send_init(&RadioLinkConfig::default()).unwrap();
//!
//! let status = link.query_status().unwrap();
//! assert_eq!(status.fsm_state.name(), "RX");
//! assert_eq!(link.get_ref().last_parms(), link.parms());
//! ```

pub mod bridge;

pub use bridge::VirtualBridge;
