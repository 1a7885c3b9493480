#![allow(clippy::cast_precision_loss)]

mod ask_tell;
mod builder;
mod enqueue;
mod objective;
mod top_trials;
