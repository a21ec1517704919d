use crate::error::InputError;
use crate::geometry::Point;
use crate::input::{InputInjector, MouseButton};

/// Issues primary-button clicks at local points
///
/// Each click is move, press, release with nothing in between. There is no
/// debouncing or de-duplication: repeated points are clicked repeatedly.
pub struct ClickDispatcher<I> {
    injector: I,
    clicks: u64,
}

impl<I: InputInjector> ClickDispatcher<I> {
    pub fn new(injector: I) -> Self {
        Self {
            injector,
            clicks: 0,
        }
    }

    /// Click `point + offset` and return the absolute target.
    ///
    /// `point` is local to whatever region `offset` is the screen origin of.
    pub fn click(&mut self, point: Point, offset: Point) -> Result<Point, InputError> {
        let target = point.offset(offset);
        self.injector.move_to(target)?;
        self.injector.press(MouseButton::Left)?;
        self.injector.release(MouseButton::Left)?;
        self.clicks += 1;
        tracing::trace!("Clicked ({}, {})", target.x, target.y);
        Ok(target)
    }

    /// Total clicks issued through this dispatcher
    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    pub fn injector_mut(&mut self) -> &mut I {
        &mut self.injector
    }
}
