#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod pipeline;


pub use self::{
    args::Args,
    pipeline::{Pipeline, TransitContext},
};
