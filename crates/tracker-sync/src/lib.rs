//! `tracker-sync` — in-process event hub behind the `/api/sync` stream.
//!
//! # Overview
//!
//! Request handlers announce domain changes through a [`Broadcaster`]. The
//! broadcaster fans each [`Event`] out to every mailbox held in the
//! [`SubscriberRegistry`], one bounded mailbox per connected stream. A
//! [`StreamSession`] owns one mailbox and relays it to its transport until
//! the connection is cancelled or a write fails.
//!
//! Delivery is best effort: a full mailbox drops the event for that
//! subscriber only, and publishing never blocks.

pub mod broadcast;
pub mod error;
pub mod event;
pub mod registry;
pub mod session;

pub use broadcast::{Broadcaster, DeliveryReport};
pub use error::{Result, SyncError};
pub use event::{DomainEvent, Event, CONNECTED_MESSAGE, INFO_EVENT};
pub use registry::{SubscriberId, SubscriberRegistry, Subscription};
pub use session::{EventSink, SessionOutcome, SessionState, StreamSession};
