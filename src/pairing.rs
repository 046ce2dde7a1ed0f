//! Pairing of fixtures with the source blocks that follow them.
//!
//! The state machine is a pure transition function, so a document run is a
//! `fold` over its classified nodes.

use tracing::debug;

use crate::diagnostics::DocrunError;
use crate::document::{Classified, SourceBlock};
use crate::fixture::Fixture;

#[derive(Debug, Default)]
pub enum PairingState {
    #[default]
    Idle,
    PendingFixture(Fixture),
}

/// What a single node produced.
#[derive(Debug)]
pub enum Step {
    Nothing,
    /// Metadata that failed to decode.
    Malformed(DocrunError),
    /// A source block that closes a case without a fixture.
    Missing(SourceBlock),
    /// A fixture and its source block, ready to dispatch.
    Ready(Fixture, SourceBlock),
}

impl PairingState {
    pub fn accept(self, node: Classified) -> (PairingState, Step) {
        match (self, node) {
            (PairingState::Idle, Classified::Fixture(fixture)) => {
                (PairingState::PendingFixture(fixture), Step::Nothing)
            }
            (pending @ PairingState::PendingFixture(_), Classified::Fixture(discarded)) => {
                debug!(?discarded.mode, "fixture already pending, discarding the later one");
                (pending, Step::Nothing)
            }
            (PairingState::Idle, Classified::Source(source)) => {
                (PairingState::Idle, Step::Missing(source))
            }
            (PairingState::PendingFixture(fixture), Classified::Source(source)) => {
                (PairingState::Idle, Step::Ready(fixture, source))
            }
            (state, Classified::Malformed(err)) => (state, Step::Malformed(err)),
            (state, Classified::Ignored) => (state, Step::Nothing),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PairingState::PendingFixture(_))
    }
}
