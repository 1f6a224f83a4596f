#![no_std]

extern crate alloc;

mod face;
mod name;
mod timestamp;

mod scheduler;
mod strategy;
mod tables;


pub use face::*;
pub use name::*;
pub use timestamp::*;

pub use scheduler::*;
pub use strategy::*;
pub use tables::*;
