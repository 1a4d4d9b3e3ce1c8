use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::{CorrespondingEvents, LifecycleEvent};

/// Lifecycle of a full screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenEvent {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    Destroy,
}

impl LifecycleEvent for ScreenEvent {
    const ALL: &'static [Self] = &[
        ScreenEvent::Create,
        ScreenEvent::Start,
        ScreenEvent::Resume,
        ScreenEvent::Pause,
        ScreenEvent::Stop,
        ScreenEvent::Destroy,
    ];
}

static SCREEN_EVENTS: LazyLock<CorrespondingEvents<ScreenEvent>> = LazyLock::new(|| {
    CorrespondingEvents::new([
        (ScreenEvent::Create, ScreenEvent::Destroy),
        (ScreenEvent::Start, ScreenEvent::Stop),
        (ScreenEvent::Resume, ScreenEvent::Pause),
        (ScreenEvent::Pause, ScreenEvent::Stop),
        (ScreenEvent::Stop, ScreenEvent::Destroy),
    ])
    .expect("screen corresponding events table is complete")
});

impl ScreenEvent {
    pub fn corresponding_events() -> &'static CorrespondingEvents<ScreenEvent> {
        &SCREEN_EVENTS
    }
}

/// Lifecycle of a sub-view hosted inside a screen. A sub-view outlives its
/// view hierarchy, so its view can be created and destroyed more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewEvent {
    Create,
    CreateView,
    Attach,
    Detach,
    DestroyView,
    Destroy,
}

impl LifecycleEvent for ViewEvent {
    const ALL: &'static [Self] = &[
        ViewEvent::Create,
        ViewEvent::CreateView,
        ViewEvent::Attach,
        ViewEvent::Detach,
        ViewEvent::DestroyView,
        ViewEvent::Destroy,
    ];
}

static VIEW_EVENTS: LazyLock<CorrespondingEvents<ViewEvent>> = LazyLock::new(|| {
    CorrespondingEvents::new([
        (ViewEvent::Create, ViewEvent::Destroy),
        (ViewEvent::CreateView, ViewEvent::DestroyView),
        (ViewEvent::Attach, ViewEvent::Detach),
        (ViewEvent::Detach, ViewEvent::DestroyView),
        (ViewEvent::DestroyView, ViewEvent::Destroy),
    ])
    .expect("view corresponding events table is complete")
});

impl ViewEvent {
    pub fn corresponding_events() -> &'static CorrespondingEvents<ViewEvent> {
        &VIEW_EVENTS
    }
}
