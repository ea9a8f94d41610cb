//! Cartola Coach Library
//!
//! Budget-constrained futsal lineup builder: a five-slot lineup (goalkeeper,
//! fixed, two wings, pivot) picked from a player market, checked against the
//! user's cartoletas balance and saved once per active round.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
