pub mod config;
pub mod error;
pub mod gw;
pub mod notify;
pub mod poller;
pub mod store;
pub mod subs;

#[cfg(test)]
mod testutil;
