//! Envelopes: the unit of event data on the mailbox path.
//!
//! An [`Envelope`] is either one of the four static sentinels or an owned,
//! heap-allocated [`Msg`]. Owned envelopes hold on to the allocator that
//! granted them and give the reservation back when dropped, after dropping
//! their payload. They are moved, never aliased, so every path that ends an
//! envelope's life (dispatch, transport rejection, a queue being torn down)
//! releases it exactly once.

use super::alloc::{AllocError, MsgAllocator};
use super::event::{EventCode, Sentinel};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque data attached to a user envelope.
pub type Payload = Box<dyn Any + Send>;

/// Size reported to the allocator for every owned envelope.
pub const ENVELOPE_SIZE: usize = mem::size_of::<Msg>();

static NEXT_MSG_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide identifier of an owned envelope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(u64);

impl MsgId {
    fn next() -> Self {
        Self(NEXT_MSG_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}", self.0)
    }
}

/// Event code plus optional payload.
pub struct Msg {
    id: MsgId,
    code: EventCode,
    payload: Option<Payload>,
}

impl Msg {
    pub fn id(&self) -> MsgId {
        self.id
    }

    pub fn code(&self) -> EventCode {
        self.code
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Borrow the payload if it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.as_mut()?.downcast_mut::<T>()
    }

    /// Move the payload out if it is a `T`. The caller becomes its owner and
    /// the envelope will have nothing left to free for it.
    pub fn take_payload<T: Any>(&mut self) -> Option<Box<T>> {
        let payload = self.payload.take()?;
        match payload.downcast::<T>() {
            Ok(value) => Some(value),
            Err(payload) => {
                self.payload = Some(payload);
                None
            }
        }
    }

    /// Attach (or replace) the payload. A replaced payload is dropped.
    pub fn set_payload<T: Any + Send>(&mut self, payload: T) {
        self.payload = Some(Box::new(payload));
    }
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Msg")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("has_payload", &self.has_payload())
            .finish()
    }
}

/// A [`Msg`] backed by an allocator reservation.
///
/// Only [`Envelope::allocate`] creates one, so every instance pairs exactly
/// one successful `allocate` with exactly one `release`.
pub struct OwnedMsg {
    msg: Msg,
    allocator: Arc<dyn MsgAllocator>,
}

impl OwnedMsg {
    /// Reserve room through `allocator` and build the message.
    ///
    /// On refusal nothing is allocated and the payload is dropped.
    pub fn allocate(
        allocator: &Arc<dyn MsgAllocator>,
        code: EventCode,
        payload: Option<Payload>,
    ) -> Result<Box<Self>, AllocError> {
        allocator.allocate(ENVELOPE_SIZE)?;
        Ok(Box::new(Self {
            msg: Msg {
                id: MsgId::next(),
                code,
                payload,
            },
            allocator: Arc::clone(allocator),
        }))
    }
}

impl Deref for OwnedMsg {
    type Target = Msg;

    fn deref(&self) -> &Msg {
        &self.msg
    }
}

impl DerefMut for OwnedMsg {
    fn deref_mut(&mut self) -> &mut Msg {
        &mut self.msg
    }
}

impl Drop for OwnedMsg {
    fn drop(&mut self) {
        // Payload first, then the envelope's own reservation.
        drop(self.msg.payload.take());
        self.allocator.release(ENVELOPE_SIZE);
    }
}

impl fmt::Debug for OwnedMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.msg.fmt(f)
    }
}

/// Static sentinel or owned heap message.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use hsm_dispatch::core::{BoundedAllocator, Envelope, EventCode, MsgAllocator};
///
/// let heap = Arc::new(BoundedAllocator::new(4));
/// let allocator: Arc<dyn MsgAllocator> = heap.clone();
///
/// let envelope = Envelope::allocate(&allocator, EventCode::user_flag(0), None).unwrap();
/// assert_eq!(heap.outstanding(), 1);
/// drop(envelope);
/// assert_eq!(heap.outstanding(), 0);
///
/// // Sentinels never touch the allocator.
/// drop(Envelope::ENTRY);
/// assert_eq!(heap.releases(), 1);
/// ```
pub enum Envelope {
    Sentinel(Sentinel),
    Owned(Box<OwnedMsg>),
}

impl Envelope {
    pub const ENTRY: Envelope = Envelope::Sentinel(Sentinel::Entry);
    pub const EXIT: Envelope = Envelope::Sentinel(Sentinel::Exit);
    pub const TIMED: Envelope = Envelope::Sentinel(Sentinel::Timed);
    pub const INVALID: Envelope = Envelope::Sentinel(Sentinel::Invalid);

    /// Owned envelope built through [`OwnedMsg::allocate`].
    pub fn allocate(
        allocator: &Arc<dyn MsgAllocator>,
        code: EventCode,
        payload: Option<Payload>,
    ) -> Result<Self, AllocError> {
        OwnedMsg::allocate(allocator, code, payload).map(Envelope::Owned)
    }

    pub fn code(&self) -> EventCode {
        match self {
            Envelope::Sentinel(sentinel) => sentinel.code(),
            Envelope::Owned(owned) => owned.code(),
        }
    }

    /// `None` for sentinels.
    pub fn id(&self) -> Option<MsgId> {
        self.msg().map(Msg::id)
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Envelope::Sentinel(_))
    }

    pub fn msg(&self) -> Option<&Msg> {
        match self {
            Envelope::Sentinel(_) => None,
            Envelope::Owned(owned) => Some(&owned.msg),
        }
    }

    pub fn msg_mut(&mut self) -> Option<&mut Msg> {
        match self {
            Envelope::Sentinel(_) => None,
            Envelope::Owned(owned) => Some(&mut owned.msg),
        }
    }
}

impl From<Sentinel> for Envelope {
    fn from(sentinel: Sentinel) -> Self {
        Envelope::Sentinel(sentinel)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Sentinel(sentinel) => f.debug_tuple("Sentinel").field(sentinel).finish(),
            Envelope::Owned(owned) => f.debug_tuple("Owned").field(&owned.msg).finish(),
        }
    }
}
