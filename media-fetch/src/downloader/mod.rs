//! Variant selection and stream fetching.

pub mod fetcher;
pub mod stream_selector;

pub use fetcher::StreamFetcher;
pub use stream_selector::FormatSelector;
