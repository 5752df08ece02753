pub mod args;

use clap::Parser;
pub use args::{Arguments, Module, Profile};

pub fn parse() -> Arguments {
    Arguments::parse()
}
