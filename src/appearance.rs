use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use glam::Vec3;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::AppearancePalette;
use crate::scene::{NodeKind, Scene};

/// Page color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    #[default]
    Light,
    Dark,
}

impl Appearance {
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Appearance::Dark
        } else {
            Appearance::Light
        }
    }

    pub fn is_dark(self) -> bool {
        self == Appearance::Dark
    }

    pub fn toggled(self) -> Self {
        Self::from_dark(!self.is_dark())
    }
}

pub type AppearanceListener = Box<dyn FnMut(Appearance)>;

/// Live registration with an [`AppearanceSignal`].
pub trait Subscription {
    /// Stops delivery. Safe to call more than once.
    fn cancel(&mut self);
}

/// External dark/light flag: read once, then follow changes.
pub trait AppearanceSignal {
    fn current(&self) -> Appearance;

    /// Registers `listener` for subsequent changes. Must not invoke it synchronously.
    fn subscribe(&self, listener: AppearanceListener) -> Box<dyn Subscription>;
}

/// Writes the palette swatches for `appearance` into `scene`.
pub fn apply_palette(scene: &mut Scene, palette: &AppearancePalette, appearance: Appearance) {
    let dark = appearance.is_dark();
    let ids: Vec<_> = scene.nodes().map(|(id, _)| id).collect();
    for id in ids {
        if let NodeKind::Points(cloud) = &mut scene.node_mut(id).kind {
            cloud.material.color = palette.accent;
            cloud.material.opacity = if dark {
                palette.dark_opacity
            } else {
                palette.light_opacity
            };
        }
    }
    scene.background = Some(if dark {
        palette.dark_background
    } else {
        palette.light_background
    });
    if let Some(ambient) = scene.ambient.as_mut() {
        ambient.color = if dark { Vec3::ONE } else { Vec3::ZERO };
    }
}

struct Entry {
    id: u64,
    active: Rc<Cell<bool>>,
    listener: AppearanceListener,
}

#[derive(Default)]
struct FlagState {
    current: Appearance,
    next_id: u64,
    entries: Vec<Entry>,
}

/// In-process appearance flag with change notification.
///
/// Clones share the same flag.
#[derive(Clone, Default)]
pub struct AppearanceFlag {
    state: Rc<RefCell<FlagState>>,
}

impl AppearanceFlag {
    pub fn new(initial: Appearance) -> Self {
        Self {
            state: Rc::new(RefCell::new(FlagState {
                current: initial,
                ..FlagState::default()
            })),
        }
    }

    /// Updates the flag, notifying subscribers when the value changes.
    pub fn set(&self, appearance: Appearance) {
        let mut entries = {
            let mut state = self.state.borrow_mut();
            if state.current == appearance {
                return;
            }
            state.current = appearance;
            std::mem::take(&mut state.entries)
        };

        for entry in entries.iter_mut().filter(|entry| entry.active.get()) {
            (entry.listener)(appearance);
        }

        let mut state = self.state.borrow_mut();
        entries.retain(|entry| entry.active.get());
        entries.append(&mut state.entries);
        state.entries = entries;
    }

    pub fn toggle(&self) {
        let next = self.current().toggled();
        self.set(next);
    }

    pub fn subscriber_count(&self) -> usize {
        self.state
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.active.get())
            .count()
    }
}

impl AppearanceSignal for AppearanceFlag {
    fn current(&self) -> Appearance {
        self.state.borrow().current
    }

    fn subscribe(&self, listener: AppearanceListener) -> Box<dyn Subscription> {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        let active = Rc::new(Cell::new(true));
        state.entries.push(Entry {
            id,
            active: Rc::clone(&active),
            listener,
        });
        Box::new(FlagSubscription {
            id,
            active,
            flag: Rc::downgrade(&self.state),
        })
    }
}

struct FlagSubscription {
    id: u64,
    active: Rc<Cell<bool>>,
    flag: Weak<RefCell<FlagState>>,
}

impl Subscription for FlagSubscription {
    fn cancel(&mut self) {
        if !self.active.replace(false) {
            return;
        }
        let Some(flag) = self.flag.upgrade() else {
            return;
        };
        // Entries detached for dispatch are pruned by the inactive marker.
        match flag.try_borrow_mut() {
            Ok(mut state) => state.entries.retain(|entry| entry.id != self.id),
            Err(_) => warn!("appearance subscription {} cancelled during dispatch", self.id),
        };
    }
}

impl Drop for FlagSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_notifies_only_on_change() {
        let flag = AppearanceFlag::new(Appearance::Light);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _subscription = flag.subscribe(Box::new(move |a| sink.borrow_mut().push(a)));

        flag.set(Appearance::Light);
        flag.set(Appearance::Dark);
        flag.toggle();
        assert_eq!(*seen.borrow(), vec![Appearance::Dark, Appearance::Light]);
    }

    #[test]
    fn cancelled_subscription_stops_delivery() {
        let flag = AppearanceFlag::new(Appearance::Light);
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        let mut subscription = flag.subscribe(Box::new(move |_| sink.set(sink.get() + 1)));
        assert_eq!(flag.subscriber_count(), 1);

        subscription.cancel();
        subscription.cancel();
        flag.toggle();
        assert_eq!(count.get(), 0);
        assert_eq!(flag.subscriber_count(), 0);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let flag = AppearanceFlag::new(Appearance::Dark);
        drop(flag.subscribe(Box::new(|_| {})));
        assert_eq!(flag.subscriber_count(), 0);
    }
}
