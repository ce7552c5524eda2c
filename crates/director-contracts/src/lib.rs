pub mod events;
pub mod history;
pub mod runs;
pub mod tags;
pub mod world;
