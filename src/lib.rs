pub mod agent_engine;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use std::process::ExitCode;

pub fn run() -> ExitCode {
    bootstrap::main_entry()
}
