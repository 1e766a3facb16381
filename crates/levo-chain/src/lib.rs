pub mod assets;
pub mod builder;
pub mod classify;
pub mod contracts;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod nonce;
pub mod reader;
pub mod router;
pub mod units;

pub mod test_support;

pub use assets::AssetTable;
pub use builder::BundleBuilder;
pub use classify::classify_error;
pub use error::{
    BuildError, ChainReadError, ExecutionError, FailureKind, RouteError, SendTimedOut,
};
pub use executor::BundleExecutor;
pub use gateway::{AlloyGateway, ChainGateway, Submission};
pub use nonce::NonceSequencer;
pub use reader::{AlloyPositionReader, PositionSource};
pub use router::{RouteClient, RouteQuote};
