//! Typed publish/subscribe primitive (§3 "Event bus", §9 Design Notes).
//!
//! This replaces the reference's ad hoc callback-graph emitters with a sum
//! type tagged by event kind, the same substitution §9 calls for. Delivery
//! is synchronous and in registration order, mirroring how
//! `tessera-ui::plugin::PluginHost::dispatch` walks its handler list and
//! logs (rather than propagates) a handler's own failure — a subscriber
//! here cannot fail the publish, since handlers are plain closures with no
//! return value.
//!
//! Subscribers **must not** call back into the orchestrator from within a
//! handler (§6.3); [`crate::ReentrancyGuard`] is what the orchestrator uses
//! to make that an assertion failure instead of silent corruption.

use crate::model::{ComponentStats, RenderChain, RenderEvent, Severity};

/// One publishable occurrence on the bus (§6.3's subscription tag list,
/// plus `Update`, which the stats collector emits on every ingest per
/// §4.2 step 7 but which §6.3 does not itself name as an external
/// subscription — included here so an embedder can still observe it).
#[derive(Debug, Clone)]
pub enum Event {
    Render(RenderEvent),
    Update(ComponentStats),
    SeverityChange {
        component: String,
        from: Severity,
        to: Severity,
    },
    Warning {
        component: String,
    },
    Critical {
        component: String,
    },
    Chain(RenderChain),
    FpsDrop {
        fps: f64,
    },
    Ready {
        react_version: String,
    },
    Error {
        message: String,
        code: String,
    },
}

impl Event {
    fn tag(&self) -> Tag {
        match self {
            Event::Render(_) => Tag::Render,
            Event::Update(_) => Tag::Update,
            Event::SeverityChange { .. } => Tag::SeverityChange,
            Event::Warning { .. } => Tag::Warning,
            Event::Critical { .. } => Tag::Critical,
            Event::Chain(_) => Tag::Chain,
            Event::FpsDrop { .. } => Tag::FpsDrop,
            Event::Ready { .. } => Tag::Ready,
            Event::Error { .. } => Tag::Error,
        }
    }
}

/// The event kinds a handler can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Render,
    Update,
    SeverityChange,
    Warning,
    Critical,
    Chain,
    FpsDrop,
    Ready,
    Error,
}

type Handler = Box<dyn FnMut(&Event) + Send>;

struct Subscription {
    tag: Tag,
    handler: Handler,
}

/// Closure-registration pub/sub (§9: "not a trait-object callback graph").
///
/// Not `Clone`/`Sync`: it is owned exclusively by the orchestrator, which
/// is itself the single thread ever allowed to touch session state
/// (§4.1.1, §5).
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    dispatching: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every event carrying `tag`. Returns a
    /// [`SubscriptionId`] that can be passed to [`EventBus::unsubscribe`].
    pub fn subscribe(
        &mut self,
        tag: Tag,
        handler: impl FnMut(&Event) + Send + 'static,
    ) -> SubscriptionId {
        self.subscriptions.push(Subscription {
            tag,
            handler: Box::new(handler),
        });
        SubscriptionId(self.subscriptions.len() - 1)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        if id.0 < self.subscriptions.len() {
            self.subscriptions.remove(id.0);
        }
    }

    /// Delivers `event` synchronously to every handler registered for its
    /// tag, in registration order.
    ///
    /// Panics in debug builds if called re-entrantly (a handler publishing
    /// from inside its own callback): that would silently reorder delivery
    /// relative to the caller's expectations, and the spec forbids
    /// subscribers from driving the bus (§6.3).
    pub fn publish(&mut self, event: Event) {
        debug_assert!(!self.dispatching, "EventBus::publish called re-entrantly");
        self.dispatching = true;
        let tag = event.tag();
        for subscription in &mut self.subscriptions {
            if subscription.tag == tag {
                (subscription.handler)(&event);
            }
        }
        self.dispatching = false;
    }
}

/// Handle returned by [`EventBus::subscribe`], usable to later
/// [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

/// A re-entrancy guard for the orchestrator's own control methods (§6.3:
/// "Subscribers MUST NOT call orchestrator methods from within a
/// handler"). This is a separate concern from [`EventBus`]'s own dispatch
/// guard: that one protects `publish` from being re-entered by a handler
/// publishing again, while this one protects the orchestrator's
/// `configure`/`start`/`pause`/.../`stop` methods from being re-entered by
/// a handler calling back into the session. Backed by a `Cell` rather than
/// a plain bool so `enter()` only needs `&self`: a handler that captured a
/// shared handle back into the session can still trip the guard even
/// though it never gets an exclusive borrow of it.
#[derive(Default)]
pub struct ReentrancyGuard {
    active: std::cell::Cell<bool>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the guard active for the lifetime of the returned scope.
    /// Panics in debug builds if already active — a programming error
    /// (§9), not recoverable input.
    pub fn enter(&self) -> ReentrancyScope<'_> {
        debug_assert!(!self.active.get(), "re-entrant call into a guarded method");
        self.active.set(true);
        ReentrancyScope { cell: &self.active }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

pub struct ReentrancyScope<'a> {
    cell: &'a std::cell::Cell<bool>,
}

impl Drop for ReentrancyScope<'_> {
    fn drop(&mut self) {
        self.cell.set(false);
    }
}
