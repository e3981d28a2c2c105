pub mod candidates;
pub mod config;
mod context;
pub mod error;
pub mod fsm;
pub mod initiator;
pub mod node;
pub mod shared;
pub mod stack;
pub mod target;
pub mod timers;
pub mod transactions;
pub mod types;
pub mod validate;

pub use candidates::Candidate;
pub use config::Config;
pub use error::Error;
pub use initiator::ScanOptions;
pub use node::Node;
pub use stack::{ Completed, Completion, Destination, JoinParams, Operation, Request, Stack };
pub use target::TargetType;
pub use types::{ Role, Status };
