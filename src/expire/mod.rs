pub mod audit;
pub mod candidates;
pub mod config;
pub mod filter;
pub mod orchestrator;
pub mod pass;
pub mod paths;
pub mod report;
pub mod session;
pub mod warn;
pub mod window;

#[cfg(test)]
pub mod testing;
