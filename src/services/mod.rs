pub mod aggregator;
pub mod credentials;
pub mod fallback;
pub mod link;
pub mod prober;
pub mod registry;
pub mod relay;
pub mod similarity;
pub mod upstream;
