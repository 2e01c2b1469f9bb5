use crate::{Claims, Context, Result};
use std::fmt;
use tracing::trace;

/// Checks a request's claims against identity discovered while resolving it.
///
/// `Ok(false)` is a trust decision; an error is reserved for failures of the infrastructure
/// needed to reach a decision.
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, ctx: &Context, claims: &Claims) -> Result<bool>;
}

/// Adds entries to a claim set before a token is issued.
#[async_trait::async_trait]
pub trait Injector: Send + Sync {
    async fn inject(&self, ctx: &Context, claims: &mut Claims) -> Result<()>;
}

/// A [`Validator`] backed by a synchronous predicate.
#[derive(Clone)]
pub struct ValidatorFn<F>(F);

/// Per-request authentication state.
///
/// An `Authentication` is created for a single inbound request, populated by the stages of its
/// resolution chain, and consumed once the request's claims are known. Stages receive it by
/// mutable reference, so registrations only ever happen from the resolving task.
#[derive(Default)]
pub struct Authentication {
    validators: Vec<Box<dyn Validator>>,
    injectors: Vec<Box<dyn Injector>>,
}

// === impl Authentication ===

impl Authentication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_validator(&mut self, validator: impl Validator + 'static) {
        self.validators.push(Box::new(validator));
    }

    pub fn register_injector(&mut self, injector: impl Injector + 'static) {
        self.injectors.push(Box::new(injector));
    }

    pub fn validators(&self) -> &[Box<dyn Validator>] {
        &self.validators
    }

    pub fn injectors(&self) -> &[Box<dyn Injector>] {
        &self.injectors
    }

    /// Runs every registered validator in registration order.
    ///
    /// The claims are trusted only if all validators accept them. Evaluation stops at the first
    /// rejection or error.
    pub async fn validate(&self, ctx: &Context, claims: &Claims) -> Result<bool> {
        for (i, validator) in self.validators.iter().enumerate() {
            if !validator.validate(ctx, claims).await? {
                trace!(validator = i, "Claims rejected");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Runs every registered injector in registration order.
    pub async fn inject(&self, ctx: &Context, claims: &mut Claims) -> Result<()> {
        for injector in &self.injectors {
            injector.inject(ctx, claims).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authentication")
            .field("validators", &self.validators.len())
            .field("injectors", &self.injectors.len())
            .finish()
    }
}

// === impl ValidatorFn ===

impl<F> ValidatorFn<F>
where
    F: Fn(&Claims) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait::async_trait]
impl<F> Validator for ValidatorFn<F>
where
    F: Fn(&Claims) -> bool + Send + Sync,
{
    async fn validate(&self, _: &Context, claims: &Claims) -> Result<bool> {
        Ok((self.0)(claims))
    }
}
