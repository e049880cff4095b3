use core::cell::RefCell;

use rand::{Rng as _, RngCore, SeedableRng as _, rngs::StdRng, seq::SliceRandom as _};
use time::{Date, OffsetDateTime};

/// Guild-scoped event membership, as seen by template actions.
pub trait EventDirectory: Send + Sync {
    /// Display names of the members of `event`, or `None` if no such event
    /// exists.
    fn members(&self, event: &str) -> Option<Vec<String>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl EventDirectory for NoEvents {
    fn members(&self, _event: &str) -> Option<Vec<String>> {
        None
    }
}

static NO_EVENTS: NoEvents = NoEvents;

/// Read-only view of one command invocation handed to template actions.
///
/// Borrows everything for the duration of a single expansion. Randomness
/// comes from the injected generator so expansions can be replayed.
pub struct EvalContext<'a> {
    pub sender: &'a str,
    pub channel: &'a str,
    /// Free text following the command name.
    pub message: &'a str,
    /// Display names of the members mentioned in the message.
    pub mentions: &'a [String],
    pub events: &'a dyn EventDirectory,
    pub today: Date,
    rng: RefCell<Box<dyn RngCore + 'a>>,
}

impl core::fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EvalContext")
            .field("sender", &self.sender)
            .field("channel", &self.channel)
            .field("message", &self.message)
            .field("mentions", &self.mentions)
            .field("today", &self.today)
            .finish_non_exhaustive()
    }
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn new(sender: &'a str, message: &'a str) -> Self {
        Self {
            sender,
            channel: "",
            message,
            mentions: &[],
            events: &NO_EVENTS,
            today: OffsetDateTime::now_utc().date(),
            rng: RefCell::new(Box::new(StdRng::from_entropy())),
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: &'a str) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub fn with_mentions(mut self, mentions: &'a [String]) -> Self {
        self.mentions = mentions;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: &'a dyn EventDirectory) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_today(mut self, today: Date) -> Self {
        self.today = today;
        self
    }

    #[must_use]
    pub fn with_rng(mut self, rng: impl RngCore + 'a) -> Self {
        self.rng = RefCell::new(Box::new(rng));
        self
    }

    /// Uniform integer in `low..=high`.
    #[must_use]
    pub fn random_between(&self, low: i64, high: i64) -> i64 {
        self.rng.borrow_mut().gen_range(low..=high)
    }

    /// Uniformly chosen element of `items`.
    #[must_use]
    pub fn choose<'s, T>(&self, items: &'s [T]) -> Option<&'s T> {
        let mut rng = self.rng.borrow_mut();
        items.choose(&mut **rng)
    }
}
