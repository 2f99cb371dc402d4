pub mod orchestrator;
pub mod params;
pub mod retry;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;
