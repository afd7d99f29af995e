pub mod fetcher;
pub mod limex;
pub mod retry;

pub use fetcher::PriceFetcher;
pub use limex::LimexProvider;
pub use retry::{RetryExecutor, RetryPolicy, RetryStats};
