//! Scripted console dialogue.
//!
//! A [`DialogueScript`] is an ordered list of [`DialogueStep`]s: wait for a
//! pattern in the console output, or send a line. [`DialogueEngine`] runs a
//! script against a [`Console`], strictly in order, and stops at the first
//! wait that times out. There is no retry: the console carries no structured
//! error signal to retry against.
//!
//! The console is any byte stream pair, so scripts can be exercised against a
//! synthetic transcript as well as a live emulator.

mod console;
mod engine;
mod error;
mod script;

pub use console::{Console, ConsoleError, ConsoleMirror};
pub use engine::{DialogueEngine, DialogueReport};
pub use error::DialogueError;
pub use script::{buildlet_script, DialogueScript, DialogueStep, Phase, ScriptParams};
