use strum_macros::Display;

/// Lifecycle position of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initialized,
    Previewing,
    Scanning,
    Stopped,
    Meshed,
    Exported,
}

/// Operator intent that may move the session to another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    Init,
    Preview,
    Start,
    Stop,
    Mesh,
    Save,
}

impl Trigger {
    pub const ALL: &'static [Trigger] = &[
        Self::Init,
        Self::Preview,
        Self::Start,
        Self::Stop,
        Self::Mesh,
        Self::Save,
    ];
}

impl SessionState {
    /// State reached when `trigger`'s engine call succeeds from `self`.
    ///
    /// `None` means the pair is not part of the lifecycle: the trigger is a
    /// no-op and the engine must not be called.
    pub fn on_success(self, trigger: Trigger) -> Option<SessionState> {
        use SessionState::*;

        match (self, trigger) {
            (_, Trigger::Init) => Some(Initialized),
            (Initialized, Trigger::Preview) => Some(Previewing),
            (Initialized | Previewing, Trigger::Start) => Some(Scanning),
            (Previewing | Scanning, Trigger::Stop) => Some(Stopped),
            (Stopped, Trigger::Mesh) => Some(Meshed),
            (Meshed, Trigger::Save) => Some(Exported),
            _ => None,
        }
    }

    /// Whether `trigger` is accepted from this state.
    pub fn accepts(self, trigger: Trigger) -> bool {
        self.on_success(trigger).is_some()
    }

    /// Triggers accepted from this state, in lifecycle order.
    pub fn available_triggers(self) -> Vec<Trigger> {
        Trigger::ALL
            .iter()
            .copied()
            .filter(|trigger| self.accepts(*trigger))
            .collect()
    }
}
