//! Playback engine: interactive fullscreen traversal of the clip graph.
//!
//! The engine is an explicit state machine. It never touches media itself;
//! every call returns the [`PlaybackEffect`]s the host performs against its
//! single shared fullscreen video element and text layer, in order.
//!
//! ```text
//! Idle ─start─▶ Playing ─media end─▶ FadingOut ─timer─┬─▶ Playing (no text)
//!                  ▲                                  └─▶ ShowingTransition
//!                  │                                          │ click / auto-advance
//!                  └──────────────timer──────────── FadingText ◀┘
//! ```
//!
//! Every suspension point hands the host a [`Ticket`]. The host passes it
//! back with the matching callback (`media_ended`, `timer_fired`, `choose`).
//! Only the ticket the engine is currently waiting on is honoured, so
//! `stop()` (which forgets it) cancels every late callback of the old
//! traversal at once.

use crate::config::PlaybackConfig;
use pov_core::SceneGraph;
use pov_core::id::NodeId;
use pov_core::model::MediaRef;
use serde::Serialize;

/// Identifies one suspension point of one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ticket(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitKind {
    /// The clip is playing; resumes on `media_ended`.
    MediaEnd,
    /// Video opacity is fading out; resumes on `timer_fired`.
    VideoFade,
    /// Choices are shown; resumes on `choose`, or on `timer_fired` when
    /// the text auto-advances.
    Choice,
    /// Choice text is fading out; resumes on `timer_fired`.
    TextFade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PlaybackState {
    Idle,
    Playing { node: NodeId },
    FadingOut { node: NodeId },
    ShowingTransition { source: NodeId, auto_advance: bool },
    FadingText { source: NodeId, next: Option<NodeId> },
}

/// Runtime traversal pointer. Exists only while playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackCursor {
    pub current: NodeId,
    /// Clip the traversal started from (the toggle key).
    pub origin: NodeId,
    /// Line index the viewer picked on the last transition.
    pub pending_choice: Option<usize>,
    /// Clips presented so far, in order.
    pub visited: Vec<NodeId>,
}

/// One clickable line of a transition card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    /// Index into the edge's lines; pass it back to `choose`.
    pub index: usize,
    pub text: String,
    /// Whether picking this line branches away from the default target.
    pub linked: bool,
}

/// Work for the host, performed in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEffect {
    /// Show the fullscreen layer.
    ShowPlayer,
    /// Swap the shared video element's source, rewind it and show it at
    /// full opacity.
    LoadMedia { node: NodeId, media: MediaRef },
    /// Ask for fullscreen. On refusal call `fullscreen_failed`.
    RequestFullscreen,
    /// Start playing; call `media_ended(ticket)` at natural end.
    Play { ticket: Ticket },
    /// Animate video opacity to `to`.
    #[serde(rename_all = "camelCase")]
    FadeVideo { to: f32, duration_ms: u32 },
    HideVideo,
    /// Render the lines as clickable fullscreen text; a click calls
    /// `choose(ticket, index)`.
    ShowChoices { ticket: Ticket, choices: Vec<Choice> },
    #[serde(rename_all = "camelCase")]
    FadeChoices { duration_ms: u32 },
    HideChoices,
    /// Call `timer_fired(ticket)` after the delay.
    #[serde(rename_all = "camelCase")]
    ScheduleTimer { ticket: Ticket, delay_ms: u32 },
    /// Drop every timer scheduled so far.
    CancelTimers,
    /// Pause the shared video element and rewind it to 0.
    PauseAndReset,
    ExitFullscreen,
    HidePlayer,
    /// The sequence reached a clip with nowhere to go.
    Finished { visited: Vec<NodeId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fullscreen {
    Off,
    Requested,
    Refused,
}

pub struct PlaybackEngine {
    config: PlaybackConfig,
    state: PlaybackState,
    cursor: Option<PlaybackCursor>,
    waiting: Option<(Ticket, WaitKind)>,
    next_ticket: u32,
    fullscreen: Fullscreen,
}

impl PlaybackEngine {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            state: PlaybackState::Idle,
            cursor: None,
            waiting: None,
            next_ticket: 0,
            fullscreen: Fullscreen::Off,
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state != PlaybackState::Idle
    }

    pub fn cursor(&self) -> Option<&PlaybackCursor> {
        self.cursor.as_ref()
    }

    /// The ticket the engine is waiting on, if any.
    pub fn waiting(&self) -> Option<(Ticket, WaitKind)> {
        self.waiting
    }

    // ─── Control ─────────────────────────────────────────────────────────

    /// Start a traversal at `start`. A running traversal is abandoned
    /// first. Unknown clips are ignored.
    pub fn start(&mut self, graph: &SceneGraph, start: NodeId) -> Vec<PlaybackEffect> {
        if !graph.contains(start) {
            log::warn!("playback: cannot start at missing clip {start}");
            return vec![];
        }
        let mut effects = Vec::new();
        if self.is_playing() {
            self.waiting = None;
            effects.push(PlaybackEffect::CancelTimers);
            effects.push(PlaybackEffect::HideChoices);
        } else {
            effects.push(PlaybackEffect::ShowPlayer);
        }
        log::debug!("playback: start at {start}");
        self.cursor = Some(PlaybackCursor {
            current: start,
            origin: start,
            pending_choice: None,
            visited: Vec::new(),
        });
        self.enter(graph, start, &mut effects);
        effects
    }

    /// Start at `node`, or stop when the running traversal started there.
    /// Only the origin stops playback: pressing play on any other clip,
    /// including one later in the running sequence, restarts from that clip.
    pub fn toggle(&mut self, graph: &SceneGraph, node: NodeId) -> Vec<PlaybackEffect> {
        if self.cursor.as_ref().is_some_and(|c| c.origin == node) {
            self.stop()
        } else {
            self.start(graph, node)
        }
    }

    /// Cancel from any state. Late callbacks of this traversal are ignored.
    pub fn stop(&mut self) -> Vec<PlaybackEffect> {
        if !self.is_playing() {
            return vec![];
        }
        log::debug!("playback: stop in {:?}", self.state);
        let mut effects = vec![
            PlaybackEffect::CancelTimers,
            PlaybackEffect::HideChoices,
            PlaybackEffect::PauseAndReset,
        ];
        self.teardown(&mut effects);
        effects
    }

    /// Fullscreen was refused. Playback continues windowed.
    pub fn fullscreen_failed(&mut self) {
        log::warn!("playback: fullscreen refused, continuing windowed");
        if self.fullscreen == Fullscreen::Requested {
            self.fullscreen = Fullscreen::Refused;
        }
    }

    // ─── Host callbacks ──────────────────────────────────────────────────

    /// The shared video element reached its natural end.
    pub fn media_ended(&mut self, graph: &SceneGraph, ticket: Ticket) -> Vec<PlaybackEffect> {
        if !self.accept(ticket, WaitKind::MediaEnd) {
            return vec![];
        }
        let PlaybackState::Playing { node } = self.state else {
            return vec![];
        };

        let mut effects = Vec::new();
        if graph.resolve_next(node, None).is_none() {
            self.finish(&mut effects);
            return effects;
        }

        self.state = PlaybackState::FadingOut { node };
        effects.push(PlaybackEffect::FadeVideo {
            to: 0.0,
            duration_ms: self.config.video_fade_ms,
        });
        let ticket = self.wait(WaitKind::VideoFade);
        effects.push(PlaybackEffect::ScheduleTimer {
            ticket,
            delay_ms: self.config.video_fade_ms,
        });
        effects
    }

    /// A timer scheduled through `ScheduleTimer` fired.
    pub fn timer_fired(&mut self, graph: &SceneGraph, ticket: Ticket) -> Vec<PlaybackEffect> {
        let Some((expected, kind)) = self.waiting else {
            return vec![];
        };
        if expected != ticket {
            log::trace!("playback: stale timer {ticket:?}");
            return vec![];
        }

        let mut effects = Vec::new();
        match (kind, self.state) {
            (WaitKind::VideoFade, PlaybackState::FadingOut { node }) => {
                self.waiting = None;
                effects.push(PlaybackEffect::HideVideo);
                self.after_fade(graph, node, &mut effects);
            }
            (
                WaitKind::Choice,
                PlaybackState::ShowingTransition {
                    source,
                    auto_advance: true,
                },
            ) => {
                self.waiting = None;
                log::debug!("playback: auto-advance from {source}");
                let next = graph.resolve_next(source, None);
                self.fade_text(source, next, &mut effects);
            }
            (WaitKind::TextFade, PlaybackState::FadingText { next, .. }) => {
                self.waiting = None;
                effects.push(PlaybackEffect::HideChoices);
                match next.filter(|n| graph.contains(*n)) {
                    Some(next) => self.enter(graph, next, &mut effects),
                    None => self.finish(&mut effects),
                }
            }
            _ => {}
        }
        effects
    }

    /// The viewer clicked choice `index`.
    pub fn choose(&mut self, graph: &SceneGraph, ticket: Ticket, index: usize) -> Vec<PlaybackEffect> {
        if self.waiting != Some((ticket, WaitKind::Choice)) {
            return vec![];
        }
        let PlaybackState::ShowingTransition { source, .. } = self.state else {
            return vec![];
        };
        let visible = graph
            .outgoing(source)
            .and_then(|e| e.lines.get(index))
            .is_some_and(|l| !l.is_blank());
        if !visible {
            log::debug!("playback: ignoring click on hidden line {index}");
            return vec![];
        }

        self.waiting = None;
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.pending_choice = Some(index);
        }
        let next = graph.resolve_next(source, Some(index));
        log::debug!("playback: choice {index} from {source} -> {next:?}");
        let mut effects = vec![PlaybackEffect::CancelTimers];
        self.fade_text(source, next, &mut effects);
        effects
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn accept(&self, ticket: Ticket, kind: WaitKind) -> bool {
        let ok = self.waiting == Some((ticket, kind));
        if !ok {
            log::trace!("playback: ignoring {kind:?} for {ticket:?}");
        }
        ok
    }

    fn wait(&mut self, kind: WaitKind) -> Ticket {
        self.next_ticket = self.next_ticket.wrapping_add(1);
        let ticket = Ticket(self.next_ticket);
        self.waiting = Some((ticket, kind));
        ticket
    }

    fn enter(&mut self, graph: &SceneGraph, node: NodeId, effects: &mut Vec<PlaybackEffect>) {
        let Some(clip) = graph.node(node) else {
            self.finish(effects);
            return;
        };
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.current = node;
            cursor.visited.push(node);
        }
        self.state = PlaybackState::Playing { node };
        effects.push(PlaybackEffect::LoadMedia {
            node,
            media: clip.media.clone(),
        });
        if self.fullscreen == Fullscreen::Off {
            self.fullscreen = Fullscreen::Requested;
            effects.push(PlaybackEffect::RequestFullscreen);
        }
        let ticket = self.wait(WaitKind::MediaEnd);
        effects.push(PlaybackEffect::Play { ticket });
    }

    /// The video finished fading out after `node`.
    fn after_fade(&mut self, graph: &SceneGraph, node: NodeId, effects: &mut Vec<PlaybackEffect>) {
        let Some(edge) = graph.outgoing(node) else {
            self.finish(effects);
            return;
        };
        if !edge.has_text() {
            match graph.resolve_next(node, None) {
                Some(next) => self.enter(graph, next, effects),
                None => self.finish(effects),
            }
            return;
        }

        let choices: Vec<Choice> = edge
            .visible_lines()
            .map(|(index, line)| Choice {
                index,
                text: line.text.clone(),
                linked: line.linked.is_some(),
            })
            .collect();
        let auto_advance = !edge.has_branches();
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.pending_choice = None;
        }
        self.state = PlaybackState::ShowingTransition {
            source: node,
            auto_advance,
        };
        let ticket = self.wait(WaitKind::Choice);
        effects.push(PlaybackEffect::ShowChoices { ticket, choices });
        if auto_advance {
            effects.push(PlaybackEffect::ScheduleTimer {
                ticket,
                delay_ms: self.config.auto_advance_ms,
            });
        }
    }

    fn fade_text(&mut self, source: NodeId, next: Option<NodeId>, effects: &mut Vec<PlaybackEffect>) {
        self.state = PlaybackState::FadingText { source, next };
        effects.push(PlaybackEffect::FadeChoices {
            duration_ms: self.config.text_fade_ms,
        });
        let ticket = self.wait(WaitKind::TextFade);
        effects.push(PlaybackEffect::ScheduleTimer {
            ticket,
            delay_ms: self.config.text_fade_ms,
        });
    }

    /// Natural end of the sequence.
    fn finish(&mut self, effects: &mut Vec<PlaybackEffect>) {
        let visited = self
            .cursor
            .as_ref()
            .map(|c| c.visited.clone())
            .unwrap_or_default();
        log::debug!("playback: finished after {} clip(s)", visited.len());
        self.teardown(effects);
        effects.push(PlaybackEffect::Finished { visited });
    }

    fn teardown(&mut self, effects: &mut Vec<PlaybackEffect>) {
        if self.fullscreen == Fullscreen::Requested {
            effects.push(PlaybackEffect::ExitFullscreen);
        }
        effects.push(PlaybackEffect::HidePlayer);
        self.fullscreen = Fullscreen::Off;
        self.state = PlaybackState::Idle;
        self.cursor = None;
        self.waiting = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pov_core::model::{Position, TransitionLine, blank_lines};
    use pretty_assertions::assert_eq;

    fn clip(g: &mut SceneGraph, name: &str) -> NodeId {
        g.add_node(MediaRef::Blob(format!("blob:{name}")), name, Position::default())
    }

    fn play_ticket(effects: &[PlaybackEffect]) -> Ticket {
        effects
            .iter()
            .find_map(|e| match e {
                PlaybackEffect::Play { ticket } => Some(*ticket),
                _ => None,
            })
            .unwrap()
    }

    fn timer_ticket(effects: &[PlaybackEffect]) -> Ticket {
        effects
            .iter()
            .find_map(|e| match e {
                PlaybackEffect::ScheduleTimer { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn start_shows_player_and_requests_fullscreen_once() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        g.add_edge(a, b, blank_lines(3));
        let mut p = PlaybackEngine::new(PlaybackConfig::default());

        let fx = p.start(&g, a);
        assert_eq!(fx[0], PlaybackEffect::ShowPlayer);
        assert_eq!(
            fx[1],
            PlaybackEffect::LoadMedia {
                node: a,
                media: MediaRef::Blob("blob:a".into())
            }
        );
        assert_eq!(fx[2], PlaybackEffect::RequestFullscreen);
        assert_eq!(p.state(), PlaybackState::Playing { node: a });

        let fx = p.media_ended(&g, play_ticket(&fx));
        let fx = p.timer_fired(&g, timer_ticket(&fx));
        assert!(!fx.contains(&PlaybackEffect::RequestFullscreen));
        assert_eq!(p.state(), PlaybackState::Playing { node: b });
    }

    #[test]
    fn fullscreen_refusal_is_not_fatal() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let mut p = PlaybackEngine::new(PlaybackConfig::default());
        let fx = p.start(&g, a);
        p.fullscreen_failed();
        assert!(p.is_playing());
        let fx = p.media_ended(&g, play_ticket(&fx));
        assert!(!fx.contains(&PlaybackEffect::ExitFullscreen));
        assert!(fx.contains(&PlaybackEffect::HidePlayer));
        assert!(!p.is_playing());
    }

    #[test]
    fn wrong_ticket_is_ignored() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let mut p = PlaybackEngine::new(PlaybackConfig::default());
        let fx = p.start(&g, a);
        let t = play_ticket(&fx);
        assert!(p.timer_fired(&g, t).is_empty());
        assert!(p.media_ended(&g, Ticket(t.0 + 7)).is_empty());
        assert!(p.is_playing());
    }

    #[test]
    fn unlinked_text_auto_advances() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        g.add_edge(a, b, [TransitionLine::new("Later that day"), TransitionLine::new(" ")]);
        let mut p = PlaybackEngine::new(PlaybackConfig::default());

        let fx = p.start(&g, a);
        let fx = p.media_ended(&g, play_ticket(&fx));
        let fx = p.timer_fired(&g, timer_ticket(&fx));
        let ticket = match &fx[1] {
            PlaybackEffect::ShowChoices { ticket, choices } => {
                assert_eq!(
                    choices,
                    &vec![Choice {
                        index: 0,
                        text: "Later that day".into(),
                        linked: false
                    }]
                );
                *ticket
            }
            other => panic!("expected choices, got {other:?}"),
        };
        assert_eq!(
            fx[2],
            PlaybackEffect::ScheduleTimer {
                ticket,
                delay_ms: 2000
            }
        );

        let fx = p.timer_fired(&g, ticket);
        assert_eq!(fx[0], PlaybackEffect::FadeChoices { duration_ms: 500 });
        let fx = p.timer_fired(&g, timer_ticket(&fx));
        assert_eq!(fx[0], PlaybackEffect::HideChoices);
        assert_eq!(p.state(), PlaybackState::Playing { node: b });
    }

    #[test]
    fn linked_lines_wait_for_a_click() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        let d = clip(&mut g, "d");
        g.add_edge(
            a,
            b,
            [TransitionLine::new("Stay"), TransitionLine::linked_to("Leave", d)],
        );
        let mut p = PlaybackEngine::new(PlaybackConfig::default());

        let fx = p.start(&g, a);
        let fx = p.media_ended(&g, play_ticket(&fx));
        let fx = p.timer_fired(&g, timer_ticket(&fx));
        assert!(
            !fx.iter()
                .any(|e| matches!(e, PlaybackEffect::ScheduleTimer { .. }))
        );
        let (ticket, _) = p.waiting().unwrap();
        // A timer with the choice ticket does nothing without auto-advance.
        assert!(p.timer_fired(&g, ticket).is_empty());
        // Blank or unknown lines are not clickable.
        assert!(p.choose(&g, ticket, 5).is_empty());

        let fx = p.choose(&g, ticket, 0);
        assert_eq!(fx[0], PlaybackEffect::CancelTimers);
        assert_eq!(p.cursor().unwrap().pending_choice, Some(0));
        let fx = p.timer_fired(&g, timer_ticket(&fx));
        assert_eq!(p.state(), PlaybackState::Playing { node: b });
        assert!(fx.contains(&PlaybackEffect::HideChoices));
    }

    #[test]
    fn toggle_on_origin_stops() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        let mut p = PlaybackEngine::new(PlaybackConfig::default());
        p.toggle(&g, a);
        assert!(p.is_playing());
        let fx = p.toggle(&g, b);
        assert_eq!(fx[0], PlaybackEffect::CancelTimers);
        assert_eq!(p.cursor().unwrap().origin, b);
        let fx = p.toggle(&g, b);
        assert!(fx.contains(&PlaybackEffect::PauseAndReset));
        assert!(!p.is_playing());
        assert!(p.cursor().is_none());
    }

    #[test]
    fn stop_when_idle_is_a_noop() {
        let mut p = PlaybackEngine::new(PlaybackConfig::default());
        assert!(p.stop().is_empty());
    }

    #[test]
    fn removed_target_ends_the_sequence() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        g.add_edge(a, b, blank_lines(0));
        let mut p = PlaybackEngine::new(PlaybackConfig::default());
        let fx = p.start(&g, a);
        g.remove_node(b);
        let fx = p.media_ended(&g, play_ticket(&fx));
        assert_eq!(
            fx.last(),
            Some(&PlaybackEffect::Finished { visited: vec![a] })
        );
    }
}
