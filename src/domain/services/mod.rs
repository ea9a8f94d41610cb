pub mod catalog_filter;
pub mod lineup_builder;
