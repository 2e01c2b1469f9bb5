//! Relay metadata authentication
//!
//! The metadata service admits requests from workload pods that cannot present any credential of
//! their own at the transport layer. Instead, the service works backwards from the source address
//! of a connection:
//!
//! ```text
//! [ IP ] -> [ Pod | Condition ] -> [ token annotation ] -> [ transit decrypt ] -> [ Claims ]
//! ```
//!
//! Each arrow is an _intermediary_: a stage that produces a [`Raw`] credential, possibly by
//! transforming the credential produced by its predecessor. Stages that discover identity (for
//! instance, the namespace that a pod runs in) register [`Validator`]s on the per-request
//! [`Authentication`] so that the claims carried by the final, decrypted token can be checked
//! against what the cluster actually reports.
//!
//! This crate holds the stage-independent pieces of that pipeline. Cluster and Vault stages live in
//! their own crates.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod authentication;
mod claims;
mod context;
mod error;
mod intermediary;
pub mod jwt;
mod raw;
mod verdict;

pub use self::{
    authentication::{Authentication, Injector, Validator, ValidatorFn},
    claims::{Audience, Claims},
    context::Context,
    error::{Error, NotFoundError, Result, TransportError},
    intermediary::{Chain, ChainIntermediary, Intermediary, Resolve, Step, Transform, Transforms},
    raw::Raw,
    verdict::{authenticate, ClaimsDecoder, Verdict},
};
