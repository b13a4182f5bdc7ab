// Oracle module - THE PRICE
// Native/USD price feeds: the capability trait, a mock and a live TCP adapter

mod feed;
mod mock;
mod remote;

pub use feed::{
    OracleError, PriceOracle, RoundData, MAX_FEED_DECIMALS, PRICE_PRECISION, USD_DECIMALS,
};
pub use mock::{MockPriceFeed, DECIMALS, INITIAL_ANSWER};
pub use remote::{
    FeedRequest, FeedResponse, PriceFeedServer, RemoteFeedConfig, RemotePriceFeed,
    DEFAULT_IDLE_TIMEOUT_SECS, MAX_FRAME_SIZE,
};
