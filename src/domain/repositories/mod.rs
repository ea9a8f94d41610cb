pub mod market_backend;
