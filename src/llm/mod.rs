pub mod provider;
pub mod providers;
pub mod tool_call;
pub mod types;
