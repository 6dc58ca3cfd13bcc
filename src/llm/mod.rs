// Analysis engine adapters

pub mod provider;
pub mod google;
pub mod openai;
pub mod groq;
pub mod openrouter;
pub mod scripted;

pub use provider::*;
pub use scripted::ScriptedAdapter;
