//! Optimistic mutations with reconciliation.
//!
//! A user action is applied to the local echo right away, sent through a
//! [`MutationGateway`], and then either reconciled with the server's answer or
//! rolled back to the state before the action.

pub mod gateway;
pub mod outbox;
pub mod reconciler;
pub mod registry;
pub mod single_flight;
pub mod store;

pub use gateway::MutationGateway;
pub use outbox::{OpStatus, OperationKind, Outbox, PendingOp};
pub use reconciler::{
    CommentOutcome, IllegalTransition, LikeOutcome, MutationFailure, MutationPhase, Reconciler,
    ReplayReport,
};
pub use registry::{lock_echo, EchoRegistry, SharedEcho};
pub use single_flight::{FlightGuard, SingleFlight};
pub use store::{Applied, EchoComment, EchoId, EchoSnapshot, Effect, LocalMutation, PostEcho};
