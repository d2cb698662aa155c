//! Display enumeration and pointer location

use super::geometry::{Point, Rect, Screen, Size};

/// Source of screen geometry for HUD placement
pub trait ScreenSource {
    fn screens(&self) -> Vec<Screen>;
    fn pointer_location(&self) -> Option<Point>;
}

/// Screens reported by the window server
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemScreens;

#[cfg(target_os = "macos")]
mod macos {
    use core_graphics::display::CGDisplay;
    use core_graphics::event::CGEvent;
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
    use core_graphics::geometry::CGRect;
    use tracing::warn;

    use super::*;

    /// CoreGraphics uses a top-left origin; convert to bottom-left
    fn flip(rect: CGRect, main_height: f64) -> Rect {
        Rect::new(
            Point::new(rect.origin.x, main_height - (rect.origin.y + rect.size.height)),
            Size::new(rect.size.width, rect.size.height),
        )
    }

    impl ScreenSource for SystemScreens {
        /// The main display is reported as the focused one
        fn screens(&self) -> Vec<Screen> {
            let ids = match CGDisplay::active_displays() {
                Ok(ids) => ids,
                Err(code) => {
                    warn!(code, "failed to enumerate displays");
                    return Vec::new();
                }
            };

            let main = CGDisplay::main();
            let main_height = main.bounds().size.height;

            ids.into_iter()
                .map(|id| {
                    let frame = flip(CGDisplay::new(id).bounds(), main_height);
                    Screen {
                        frame,
                        visible_frame: frame,
                        has_focus: id == main.id,
                    }
                })
                .collect()
        }

        fn pointer_location(&self) -> Option<Point> {
            let source = CGEventSource::new(CGEventSourceStateID::CombinedSessionState).ok()?;
            let location = CGEvent::new(source).ok()?.location();
            let main_height = CGDisplay::main().bounds().size.height;
            Some(Point::new(location.x, main_height - location.y))
        }
    }
}

#[cfg(not(target_os = "macos"))]
impl ScreenSource for SystemScreens {
    /// Without a window server, assume a single 1920x1080 display
    fn screens(&self) -> Vec<Screen> {
        let frame = Rect::new(Point::new(0.0, 0.0), Size::new(1920.0, 1080.0));
        vec![Screen {
            frame,
            visible_frame: frame,
            has_focus: true,
        }]
    }

    fn pointer_location(&self) -> Option<Point> {
        None
    }
}
