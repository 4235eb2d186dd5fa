pub mod engine;
/// Charging events and session duration.
pub mod event;
/// Fleet orchestration, sequential or on scoped worker threads.
pub mod fleet;
pub mod trajectory;
pub mod vehicle;
