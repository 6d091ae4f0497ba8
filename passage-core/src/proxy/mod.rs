//! Proxy pipeline: upstream fetching, challenge detection and the
//! request flow tying codec, blocklist, cache, rewriter and limiter together

pub mod challenge;
pub mod fetch;
pub mod forward;
pub mod traits;
pub mod utils;

pub use challenge::{ChallengeDetector, ChallengeKind, ChallengeSolver};
pub use fetch::UpstreamFetcher;
pub use forward::{is_cacheable_type, ForwardProxyHandler, PipelineStage, PROXY_PREFIX};
pub use traits::{CacheStatus, InboundRequest, ProxyReply, TargetRequest, Upstream, UpstreamResponse};
pub use utils::{extract_client_ip, sanitize_url_for_log};
