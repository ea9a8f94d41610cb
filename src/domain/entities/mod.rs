pub mod lineup;
pub mod player;
pub mod round;
