//! # podwatch-rpc
//! JSON-RPC client, gossip response decoding, and multi-endpoint fallback.

pub mod client;
pub mod fallback;
pub mod shape;

pub use client::{HttpRpcClient, RpcTransport};
pub use fallback::{fetch_pods, shuffled, FallbackFetch, GET_PODS_WITH_STATS, GET_STATS};
pub use shape::{decode_pod_list, decode_pod_stats, PodStatsRaw, RawPod, StorageField};
