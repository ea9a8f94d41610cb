pub mod market_handler;
