use crate::{Authentication, Context, Raw, Result};
use std::fmt;
use tracing::trace;

/// A stage of the identity resolution pipeline.
#[async_trait::async_trait]
pub trait Intermediary: Send + Sync {
    /// Produces the stage's credential, registering any validators it derives from the identity
    /// it discovered.
    async fn next(&self, ctx: &Context, auth: &mut Authentication) -> Result<Raw>;
}

/// A stage that, in addition to a credential, reports typed metadata about the identity it
/// resolved.
#[async_trait::async_trait]
pub trait Resolve: Send + Sync {
    type Metadata: Send + 'static;

    async fn resolve(
        &self,
        ctx: &Context,
        auth: &mut Authentication,
    ) -> Result<(Raw, Self::Metadata)>;

    /// Continues resolution with a function of this stage's output.
    ///
    /// The continuation receives the stage's credential and metadata and either returns a final
    /// credential or another intermediary to run. This lets a later stage be parameterized by
    /// data discovered here without either stage knowing the other's concrete type.
    fn chain<F>(self, continuation: F) -> Chain<Self, F>
    where
        Self: Sized,
        F: Fn(&Context, Raw, Self::Metadata) -> Result<Step> + Send + Sync,
    {
        Chain {
            inner: self,
            continuation,
        }
    }
}

/// A stage whose input is the credential produced by its predecessor.
#[async_trait::async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, ctx: &Context, auth: &mut Authentication, raw: Raw) -> Result<Raw>;
}

/// The outcome of a [`Chain`] continuation.
pub enum Step {
    /// The final credential.
    Raw(Raw),

    /// A further stage to run.
    Intermediary(Box<dyn Intermediary>),
}

/// Runs a [`Resolve`] stage and hands its output to a continuation.
#[derive(Clone, Debug)]
pub struct Chain<R, F> {
    inner: R,
    continuation: F,
}

/// An ordered list of transforms, itself a transform.
#[derive(Default)]
pub struct Transforms(Vec<Box<dyn Transform>>);

/// Runs an identity-establishing stage followed by transforms, in declaration order.
///
/// Each transform receives the credential emitted by the stage before it. The first error aborts
/// the chain; no partial result is returned.
pub struct ChainIntermediary {
    first: Box<dyn Intermediary>,
    rest: Transforms,
}

// === impl Raw ===

#[async_trait::async_trait]
impl Intermediary for Raw {
    async fn next(&self, _: &Context, _: &mut Authentication) -> Result<Raw> {
        Ok(self.clone())
    }
}

// === impl Step ===

impl Step {
    pub fn intermediary(next: impl Intermediary + 'static) -> Self {
        Self::Intermediary(Box::new(next))
    }
}

impl From<Raw> for Step {
    fn from(raw: Raw) -> Self {
        Self::Raw(raw)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
            Self::Intermediary(_) => f.debug_tuple("Intermediary").finish(),
        }
    }
}

// === impl Chain ===

#[async_trait::async_trait]
impl<R, F> Intermediary for Chain<R, F>
where
    R: Resolve,
    F: Fn(&Context, Raw, R::Metadata) -> Result<Step> + Send + Sync,
{
    async fn next(&self, ctx: &Context, auth: &mut Authentication) -> Result<Raw> {
        let (raw, metadata) = self.inner.resolve(ctx, auth).await?;
        match (self.continuation)(ctx, raw, metadata)? {
            Step::Raw(raw) => Ok(raw),
            Step::Intermediary(next) => {
                trace!("Continuing with next intermediary");
                next.next(ctx, auth).await
            }
        }
    }
}

// === impl Transforms ===

impl Transforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, transform: impl Transform + 'static) -> Self {
        self.0.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[async_trait::async_trait]
impl Transform for Transforms {
    async fn transform(
        &self,
        ctx: &Context,
        auth: &mut Authentication,
        mut raw: Raw,
    ) -> Result<Raw> {
        for (i, transform) in self.0.iter().enumerate() {
            trace!(stage = i, "Transforming");
            raw = transform.transform(ctx, auth, raw).await?;
        }
        Ok(raw)
    }
}

impl fmt::Debug for Transforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transforms").field(&self.0.len()).finish()
    }
}

// === impl ChainIntermediary ===

impl ChainIntermediary {
    pub fn new(first: impl Intermediary + 'static) -> Self {
        Self {
            first: Box::new(first),
            rest: Transforms::new(),
        }
    }

    pub fn then(mut self, transform: impl Transform + 'static) -> Self {
        self.rest = self.rest.then(transform);
        self
    }
}

#[async_trait::async_trait]
impl Intermediary for ChainIntermediary {
    async fn next(&self, ctx: &Context, auth: &mut Authentication) -> Result<Raw> {
        let raw = self.first.next(ctx, auth).await?;
        self.rest.transform(ctx, auth, raw).await
    }
}

impl fmt::Debug for ChainIntermediary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainIntermediary")
            .field("transforms", &self.rest.len())
            .finish()
    }
}
