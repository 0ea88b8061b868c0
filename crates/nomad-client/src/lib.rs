pub mod adapters;
pub mod feed;
pub mod html;
pub mod http;
pub mod payload;
pub mod registry;

pub use adapters::{
    EmbeddedAdapter, EmbeddedProfile, FeedAdapter, FeedProfile, GenericAdapter, PlatformAdapter,
    RestJsonAdapter, RestJsonProfile,
};
pub use http::ReqwestClient;
pub use registry::{PlatformDescriptor, PlatformRegistry, SlugLocation, SourceFamily};
