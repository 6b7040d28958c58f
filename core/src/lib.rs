//! Client side of a mines table: round state, the request/response link to the
//! server, the round workflow and the board reveal engine.

pub use client::*;
pub use config::*;
pub use dispatcher::*;
pub use error::*;
pub use history::*;
pub use listeners::*;
pub use matrix::*;
pub use recovery::*;
pub use reveal::*;
pub use session::*;
pub use table::*;
pub use timer::*;
pub use types::*;
pub use view::*;

mod client;
mod config;
mod dispatcher;
mod error;
mod history;
mod listeners;
mod matrix;
mod recovery;
mod reveal;
mod session;
mod table;
mod timer;
mod types;
mod view;

#[cfg(test)]
mod test_utils;
