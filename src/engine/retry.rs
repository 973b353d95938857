// src/engine/retry.rs
//
// Generate -> Evaluate -> {Accept, Regenerate, GiveUp} around an external
// image generator. The pipeline itself keeps no memory between attempts.

use crate::engine::pipeline::{ProcessedSticker, StickerPipeline};
use crate::engine::raster::RasterImage;
use crate::error::{Result, StampcutError};
use tracing::{info, warn};

/// Produces a fresh raster for each attempt (1-based).
pub trait CompositeSource {
    fn generate(&mut self, attempt: u32) -> Result<RasterImage>;
}

impl<F> CompositeSource for F
where
    F: FnMut(u32) -> Result<RasterImage>,
{
    fn generate(&mut self, attempt: u32) -> Result<RasterImage> {
        self(attempt)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    Accept,
    Regenerate,
    GiveUp,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(StampcutError::invalid_config(
                "max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }
        Ok(Self { max_attempts })
    }

    /// Decision after evaluating `attempt`.
    pub fn decide(&self, attempt: u32, ok: bool) -> RetryDecision {
        if ok {
            RetryDecision::Accept
        } else if attempt < self.max_attempts {
            RetryDecision::Regenerate
        } else {
            RetryDecision::GiveUp
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome {
    Accepted {
        attempt: u32,
        sticker: Box<ProcessedSticker>,
    },
    /// Every attempt failed; `last` is the final failing artifact, which the
    /// caller may still inspect or discard.
    GaveUp {
        attempts: u32,
        last: Box<ProcessedSticker>,
    },
}

impl RetryOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RetryOutcome::Accepted { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Accepted { attempt, .. } => *attempt,
            RetryOutcome::GaveUp { attempts, .. } => *attempts,
        }
    }

    pub fn sticker(&self) -> &ProcessedSticker {
        match self {
            RetryOutcome::Accepted { sticker, .. } => sticker,
            RetryOutcome::GaveUp { last, .. } => last,
        }
    }
}

/// Drive `source` until a sticker passes or the policy gives up.
///
/// A recoverable generator error (see [`StampcutError::is_recoverable`])
/// consumes the attempt and the loop regenerates; on the last attempt, or
/// for codec and internal errors, it is returned. Pipeline errors always
/// abort.
pub fn run_with_retry<S>(
    pipeline: &StickerPipeline,
    source: &mut S,
    policy: &RetryPolicy,
) -> Result<RetryOutcome>
where
    S: CompositeSource + ?Sized,
{
    let policy = RetryPolicy::new(policy.max_attempts)?;
    let mut attempt = 1;
    loop {
        let raster = match source.generate(attempt) {
            Ok(raster) => raster,
            Err(e) if e.is_recoverable() && attempt < policy.max_attempts => {
                warn!(attempt, category = e.category().as_str(), error = %e, "generator failed, regenerating");
                attempt += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        let sticker = pipeline.process(raster)?;
        match policy.decide(attempt, sticker.ok()) {
            RetryDecision::Accept => {
                info!(attempt, "sticker accepted");
                return Ok(RetryOutcome::Accepted {
                    attempt,
                    sticker: Box::new(sticker),
                });
            }
            RetryDecision::Regenerate => {
                warn!(attempt, errors = sticker.report.errors().len(), "regenerating");
                attempt += 1;
            }
            RetryDecision::GiveUp => {
                warn!(attempts = attempt, "giving up");
                return Ok(RetryOutcome::GaveUp {
                    attempts: attempt,
                    last: Box::new(sticker),
                });
            }
        }
    }
}
