//! Вспомогательные модули

pub mod scratch;

pub use scratch::ScratchDir;
