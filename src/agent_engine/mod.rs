pub mod engine;
pub mod history;
pub mod journal;
pub mod loop_control;
pub mod repeat_guard;
pub mod state;
