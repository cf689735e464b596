//! Depth-first enumeration of every decision path.
//!
//! [`Walk`] keeps an explicit stack with one [`Frame`] per open step instead
//! of recursing, so the position can be captured as a [`Cursor`] after any
//! leaf and restored later by replaying the recorded choices.

mod context;
mod scope;
mod step;

pub use context::{Context, Team};
pub use scope::{Pin, Scope};
pub use step::{Candidates, MIN_RECRUITS, Step, compress_recruits, expand_recruits};

use crate::ally::Ally;
use crate::codec::{CodecError, OutcomeCode, Traversal, TraversalCode};
use crate::outcome::Outcome;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The mission state contradicts itself. Never expected on a correct tree;
/// a run that hits one stops.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no candidates at the {step} step")]
    NoCandidates { step: Step },
    #[error("{ally} is not active at the {step} step")]
    InactiveAlly { step: Step, ally: Ally },
    #[error("no eligible victim at the {step} step")]
    NoVictim { step: Step },
    #[error("nobody is left to defend")]
    EmptyDefense,
    #[error("{remaining} still unresolved at the end of the mission")]
    Unresolved { remaining: Ally },
    #[error("{value} is not a legal {step} choice")]
    IllegalChoice { step: Step, value: u16 },
    #[error("the {step} choice has not been made")]
    MissingChoice { step: Step },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A saved position cannot be restored against the current tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor has {found} frames, expected {expected}")]
    Length { found: usize, expected: usize },
    #[error("cursor frame {index} is for {found}, expected {expected}")]
    StepOrder {
        index: usize,
        found: Step,
        expected: Step,
    },
    #[error("{value} is not a candidate at the {step} step")]
    NotACandidate { step: Step, value: u16 },
    #[error("cursor replay failed: {0}")]
    Engine(#[from] EngineError),
}

/// One complete traversal and where it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Leaf {
    pub traversal: TraversalCode,
    pub outcome: OutcomeCode,
}

/// The choice recorded for one open step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorFrame {
    pub step: Step,
    pub value: u16,
}

/// Serialisable walk position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "frames", rename_all = "snake_case")]
pub enum Cursor {
    /// Nothing emitted yet.
    #[default]
    Start,
    /// The choices of the last emitted leaf, root first.
    At(Vec<CursorFrame>),
    /// Every leaf has been emitted.
    Done,
}

impl Cursor {
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone)]
struct Frame {
    step: Step,
    ctx: Context,
    candidates: Candidates,
    next: usize,
}

impl Frame {
    fn open(step: Step, ctx: Context, scope: &Scope) -> Result<Self, EngineError> {
        let raw = step.candidates(&ctx);
        if raw.is_empty() {
            return Err(EngineError::NoCandidates { step });
        }
        Ok(Self {
            step,
            ctx,
            candidates: scope.filter(step, raw),
            next: 0,
        })
    }

    /// The value taken on the way to the current leaf.
    fn taken(&self) -> Option<u16> {
        self.next
            .checked_sub(1)
            .and_then(|i| self.candidates.get(i).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Running,
    Done,
    Failed,
}

/// Iterator over every leaf in scope, in canonical order.
#[derive(Debug, Clone)]
pub struct Walk {
    scope: Scope,
    stack: Vec<Frame>,
    state: State,
}

impl Walk {
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            stack: Vec::with_capacity(Step::COUNT),
            state: State::Fresh,
        }
    }

    /// Continues after the leaf recorded in `cursor`.
    ///
    /// # Errors
    ///
    /// Returns `CursorError` if the cursor does not describe a path through
    /// the tree under `scope`.
    pub fn resume(scope: Scope, cursor: &Cursor) -> Result<Self, CursorError> {
        let mut walk = Self::new(scope);
        let frames = match cursor {
            Cursor::Start => return Ok(walk),
            Cursor::Done => {
                walk.state = State::Done;
                return Ok(walk);
            }
            Cursor::At(frames) => frames,
        };
        if frames.len() != Step::COUNT {
            return Err(CursorError::Length {
                found: frames.len(),
                expected: Step::COUNT,
            });
        }

        let mut ctx = Context::root();
        for (index, (saved, expected)) in frames.iter().zip(Step::ALL).enumerate() {
            if saved.step != expected {
                return Err(CursorError::StepOrder {
                    index,
                    found: saved.step,
                    expected,
                });
            }
            let mut frame = Frame::open(expected, ctx, &walk.scope)?;
            let position = frame
                .candidates
                .iter()
                .position(|&v| v == saved.value)
                .ok_or(CursorError::NotACandidate {
                    step: expected,
                    value: saved.value,
                })?;
            frame.next = position + 1;
            ctx = ctx.advance(expected, saved.value)?;
            walk.stack.push(frame);
        }
        walk.state = State::Running;
        Ok(walk)
    }

    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Position after the most recently emitted leaf.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        match self.state {
            State::Fresh => Cursor::Start,
            State::Done => Cursor::Done,
            State::Running | State::Failed => Cursor::At(
                self.stack
                    .iter()
                    .filter_map(|frame| {
                        frame.taken().map(|value| CursorFrame {
                            step: frame.step,
                            value,
                        })
                    })
                    .collect(),
            ),
        }
    }

    fn fail(&mut self, err: EngineError) -> Option<Result<Leaf, EngineError>> {
        self.state = State::Failed;
        self.stack.clear();
        Some(Err(err))
    }
}

impl Iterator for Walk {
    type Item = Result<Leaf, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Done | State::Failed => return None,
            State::Fresh => {
                self.state = State::Running;
                match Frame::open(Step::Recruitment, Context::root(), &self.scope) {
                    Ok(frame) => self.stack.push(frame),
                    Err(err) => return self.fail(err),
                }
            }
            State::Running => {}
        }

        loop {
            let Some(top) = self.stack.last_mut() else {
                self.state = State::Done;
                return None;
            };
            let Some(&value) = top.candidates.get(top.next) else {
                self.stack.pop();
                continue;
            };
            top.next += 1;
            let step = top.step;
            let child = match top.ctx.advance(step, value) {
                Ok(child) => child,
                Err(err) => return self.fail(err),
            };

            if let Some(next_step) = step.next() {
                match Frame::open(next_step, child, &self.scope) {
                    Ok(frame) => self.stack.push(frame),
                    Err(err) => return self.fail(err),
                }
                continue;
            }

            return match child.finish() {
                Ok(outcome) => Some(Ok(Leaf {
                    traversal: child.traversal.encode(),
                    outcome: outcome.encode(),
                })),
                Err(err) => self.fail(err),
            };
        }
    }
}

impl std::iter::FusedIterator for Walk {}

/// Re-evaluates a traversal from the root, checking every field against the
/// candidates its prefix allows.
///
/// # Errors
///
/// Returns `EngineError::IllegalChoice` for the first field that is not a
/// candidate, or any error raised while resolving casualties.
pub fn replay(traversal: &Traversal) -> Result<Outcome, EngineError> {
    let mut ctx = Context::root();
    for step in Step::ALL {
        let value = traversal.get(step);
        if !step.candidates(&ctx).contains(&value) {
            return Err(EngineError::IllegalChoice { step, value });
        }
        ctx = ctx.advance(step, value)?;
    }
    ctx.finish()
}

/// [`replay`] for a packed traversal.
///
/// # Errors
///
/// See [`replay`].
pub fn replay_code(code: TraversalCode) -> Result<Outcome, EngineError> {
    replay(&Traversal::decode(code))
}
