//! Outgoing message content.
//!
//! Stage handlers ask a [`ContentProvider`] for the text of their message.
//! The bundled [`TemplateContentProvider`] combines a greeting picked from a
//! fixed per-stage pool with a fixed stage body. Greeting selection is the
//! only randomness in the workflow, and the RNG is injectable so tests can
//! pin it with a seed.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{CoreError, CoreResult};
use crate::stage::StageId;
use crate::state::WorkflowState;

/// Produces the text of a stage's outgoing message.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Return the message for `stage`. Must not be empty.
    async fn produce_message(&self, stage: StageId, state: &WorkflowState) -> CoreResult<String>;
}

const GREET_GREETINGS: &[&str] = &[
    "Hi there, hope your week is going well!",
    "Hello! Thanks for taking a moment to read this.",
    "Hi! We've been following your work for a while now.",
    "Hey, great to connect with you!",
    "Hello and thanks for all the inspiring posts!",
];

const TYPE_GREETINGS: &[&str] = &[
    "Thanks for getting back to us!",
    "Great to hear from you again.",
    "Thank you for the quick reply!",
    "Appreciate you sharing those links.",
];

const BRIEF_GREETINGS: &[&str] = &[
    "Thanks for confirming the terms!",
    "Wonderful, we're glad the terms work for you.",
    "Great, let's move on to the campaign details.",
    "Thank you, that's really helpful.",
];

const SCHEDULE_GREETINGS: &[&str] = &[
    "Thanks for reviewing the brief!",
    "Great, glad the brief looks good.",
    "Thank you for going through the brief so carefully.",
    "Wonderful, we're almost there.",
];

const PRODUCT_GREETINGS: &[&str] = &[
    "Thanks for sharing your availability!",
    "Perfect, that timing works for us.",
    "Great, the schedule is noted on our side.",
    "Thank you, we've locked in your dates.",
];

const ADDRESS_GREETINGS: &[&str] = &[
    "Great choice!",
    "Thanks for picking the products.",
    "Lovely, those are some of our favourites too.",
    "Thank you, your selection is confirmed.",
];

const REMINDER_GREETINGS: &[&str] = &[
    "Thanks for the address!",
    "Quick update on your package.",
    "Good news about your shipment.",
    "Just a friendly heads-up.",
];

const SCRIPT_REMINDER_GREETINGS: &[&str] = &[
    "Hope you're enjoying the products!",
    "Glad the package arrived safely.",
    "A quick note before you start filming.",
    "Thanks for confirming receipt!",
];

const FINAL_GREETINGS: &[&str] = &[
    "Thank you so much for everything!",
    "It's been a pleasure working with you.",
    "We really appreciate your time and creativity.",
    "Thanks again for a smooth collaboration!",
];

/// Greeting pool for `stage`. Never empty.
pub fn greeting_pool(stage: StageId) -> &'static [&'static str] {
    match stage {
        StageId::Greet => GREET_GREETINGS,
        StageId::Type => TYPE_GREETINGS,
        StageId::Brief => BRIEF_GREETINGS,
        StageId::Schedule => SCHEDULE_GREETINGS,
        StageId::Product => PRODUCT_GREETINGS,
        StageId::Address => ADDRESS_GREETINGS,
        StageId::Reminder => REMINDER_GREETINGS,
        StageId::ScriptReminder => SCRIPT_REMINDER_GREETINGS,
        StageId::Final => FINAL_GREETINGS,
    }
}

/// Fixed body text for `stage`.
pub fn stage_body(stage: StageId, state: &WorkflowState) -> String {
    match stage {
        StageId::Greet => {
            let platform = state
                .influencer_info
                .as_ref()
                .map(|i| i.platform.trim())
                .filter(|p| !p.is_empty())
                .map(|p| format!(" on {}", p))
                .unwrap_or_default();
            format!(
                "We really like the content you share{} and would love to talk about a collaboration. \
                 Could you share the links to your social platforms?",
                platform
            )
        }
        StageId::Type => "Please confirm the following collaboration terms:\n\
             1. Collaboration type: single post, collection post or pure commission\n\
             2. Your price range\n\
             3. Product arrangement: sample for review, gifted product or order-based"
            .to_string(),
        StageId::Brief => "Please review the attached campaign brief and let us know if anything is unclear. \
             Once you're happy with it we'll move on to the next step."
            .to_string(),
        StageId::Schedule => "When would be a good time for you to publish? \
             We'll plan our side around your schedule."
            .to_string(),
        StageId::Product => "Please choose the products you'd like to feature from the list below, \
             and tell us if you need more details on any of them."
            .to_string(),
        StageId::Address => "Please send us your shipping address. We'll dispatch the products \
             right away and share a tracking link."
            .to_string(),
        StageId::Reminder => "Your package is on its way. Please confirm once it arrives \
             so we can continue with the next steps."
            .to_string(),
        StageId::ScriptReminder => "Please follow the script guidelines in the brief when creating \
             your content, and reach out if anything needs adjusting. \
             Remember to publish within the agreed schedule."
            .to_string(),
        StageId::Final => match state.nickname() {
            Some(name) => format!(
                "Thanks for collaborating with us, {}! We'll be in touch about future opportunities. \
                 All the best!",
                name
            ),
            None => "Thanks for collaborating with us! We'll be in touch about future opportunities. \
                 All the best!"
                .to_string(),
        },
    }
}

/// Template-based provider with an injectable random source.
pub struct TemplateContentProvider<R = StdRng> {
    rng: Mutex<R>,
}

impl TemplateContentProvider<StdRng> {
    /// Provider seeded from OS entropy; greetings vary across runs.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Provider with a fixed seed; greetings are reproducible.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for TemplateContentProvider<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> TemplateContentProvider<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Pick a greeting for `stage`, uniformly from its pool.
    pub fn pick_greeting(&self, stage: StageId) -> &'static str {
        let pool = greeting_pool(stage);
        let mut rng = self.rng.lock();
        pool.choose(&mut *rng).copied().unwrap_or_default()
    }
}

#[async_trait]
impl<R: Rng + Send> ContentProvider for TemplateContentProvider<R> {
    async fn produce_message(&self, stage: StageId, state: &WorkflowState) -> CoreResult<String> {
        let greeting = self.pick_greeting(stage);
        let body = stage_body(stage, state);

        let message = if greeting.is_empty() {
            body
        } else {
            format!("{}\n\n{}", greeting, body)
        };

        if message.trim().is_empty() {
            return Err(CoreError::InvalidState(format!(
                "content provider produced an empty message for stage '{}'",
                stage
            )));
        }
        Ok(message)
    }
}
