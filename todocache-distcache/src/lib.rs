//! todocache Distcache - Peer-Distributed Read-Through Cache
//!
//! A small distributed cache in the groupcache mould:
//!
//! - A [`Group`] is a named, byte-budgeted cache bound to one [`Getter`].
//!   Nothing is ever written into a group directly; values only enter it
//!   through the getter on a miss.
//! - Keys are spread over the peer set with a consistent hash ring. A miss
//!   for a key owned by another node is fetched from that node over HTTP;
//!   a miss for a key owned locally runs the getter.
//! - Concurrent misses for the same key are coalesced into one load.
//! - [`HttpPool`] is both the peer picker and the server side of the peer
//!   protocol; its router must be mounted on the node's own address.
//!
//! Eviction (LRU by bytes, optional TTL) is entirely internal; callers never
//! observe or control it.

pub mod byteview;
pub mod consistenthash;
pub mod error;
pub mod group;
pub mod http;
pub mod peers;
pub mod singleflight;

pub use byteview::ByteView;
pub use error::{BoxError, CacheError, CacheResult};
pub use group::{CacheStats, Getter, Group, GroupOptions};
pub use http::{HttpGetter, HttpPool, HttpPoolOptions, DEFAULT_BASE_PATH};
pub use peers::{NoPeers, PeerGetter, PeerPicker};
