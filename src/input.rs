/// Pointer injection and physical input monitoring
///
/// `InputInjector` is the seam between the game loop and the operating system's
/// input devices. `RdevInjector` is the production implementation; tests drive
/// the loop with scripted injectors instead.
use crate::error::InputError;
use crate::geometry::Point;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use rdev::{listen, simulate, Event, EventType};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Operator activity on the physical pointer device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    Press(MouseButton),
    Release(MouseButton),
    Scroll { delta_x: i64, delta_y: i64 },
}

/// Synthetic pointer control plus a bounded wait for real pointer activity
pub trait InputInjector {
    /// Move the pointer to a screen-absolute position
    fn move_to(&mut self, point: Point) -> Result<(), InputError>;

    fn press(&mut self, button: MouseButton) -> Result<(), InputError>;

    fn release(&mut self, button: MouseButton) -> Result<(), InputError>;

    /// Block up to `timeout` for a press, release or scroll from the physical
    /// device. Activity that happened before this call is not reported.
    fn await_activity(&mut self, timeout: Duration) -> Result<Option<ActivityEvent>, InputError>;
}

impl<T: InputInjector + ?Sized> InputInjector for &mut T {
    fn move_to(&mut self, point: Point) -> Result<(), InputError> {
        (**self).move_to(point)
    }

    fn press(&mut self, button: MouseButton) -> Result<(), InputError> {
        (**self).press(button)
    }

    fn release(&mut self, button: MouseButton) -> Result<(), InputError> {
        (**self).release(button)
    }

    fn await_activity(&mut self, timeout: Duration) -> Result<Option<ActivityEvent>, InputError> {
        (**self).await_activity(timeout)
    }
}

/// `rdev`-backed injector
///
/// A background thread runs `rdev::listen` for the life of the process and
/// forwards pointer button and wheel events over a channel. Events queued
/// before `await_activity` is entered are discarded, which also drops the
/// echoes of our own synthetic clicks on platforms that report them.
///
/// # Platform Notes
/// - macOS: needs Accessibility permission for both listening and simulating
/// - Linux: X11 only (uses the XRecord and XTest extensions)
pub struct RdevInjector {
    activity: Receiver<ActivityEvent>,
}

impl RdevInjector {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();

        thread::spawn(move || {
            let result = listen(move |event: Event| {
                if let Some(activity) = to_activity(&event.event_type) {
                    // Receiver gone means the process is shutting down
                    let _ = tx.send(activity);
                }
            });
            if let Err(e) = result {
                tracing::error!("Pointer listener stopped: {:?}", e);
            }
        });

        Self { activity: rx }
    }

    fn send(&self, event: EventType, action: &str) -> Result<(), InputError> {
        simulate(&event).map_err(|_| InputError::SimulateFailed {
            action: action.to_string(),
        })?;

        // macOS drops synthetic events sent back to back
        #[cfg(target_os = "macos")]
        thread::sleep(Duration::from_millis(20));

        Ok(())
    }
}

impl Default for RdevInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl InputInjector for RdevInjector {
    fn move_to(&mut self, point: Point) -> Result<(), InputError> {
        self.send(
            EventType::MouseMove {
                x: point.x as f64,
                y: point.y as f64,
            },
            "pointer move",
        )
    }

    fn press(&mut self, button: MouseButton) -> Result<(), InputError> {
        self.send(EventType::ButtonPress(to_rdev(button)), "button press")
    }

    fn release(&mut self, button: MouseButton) -> Result<(), InputError> {
        self.send(EventType::ButtonRelease(to_rdev(button)), "button release")
    }

    fn await_activity(&mut self, timeout: Duration) -> Result<Option<ActivityEvent>, InputError> {
        let stale = self.activity.try_iter().count();
        if stale > 0 {
            tracing::trace!("Discarded {} pointer events from before the wait", stale);
        }

        match self.activity.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(InputError::ListenerUnavailable),
        }
    }
}

fn to_rdev(button: MouseButton) -> rdev::Button {
    match button {
        MouseButton::Left => rdev::Button::Left,
        MouseButton::Right => rdev::Button::Right,
        MouseButton::Middle => rdev::Button::Middle,
    }
}

fn from_rdev(button: rdev::Button) -> Option<MouseButton> {
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        rdev::Button::Unknown(_) => None,
    }
}

/// Pointer events that count as operator activity; keys and moves do not
fn to_activity(event: &EventType) -> Option<ActivityEvent> {
    match *event {
        EventType::ButtonPress(button) => from_rdev(button).map(ActivityEvent::Press),
        EventType::ButtonRelease(button) => from_rdev(button).map(ActivityEvent::Release),
        EventType::Wheel { delta_x, delta_y } => Some(ActivityEvent::Scroll { delta_x, delta_y }),
        _ => None,
    }
}
