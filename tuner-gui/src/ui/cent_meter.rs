//! # Cent Meter Widget
//!
//! A horizontal needle showing how far the current reading sits from the
//! nearest note. Green inside the in-tune window, red outside it.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};

/// The meter spans -50 to +50 cents.
const METER_RANGE: f32 = 50.0;

/// Cents between minor tick marks.
const TICK_STEP: f32 = 10.0;

const IN_TUNE_COLOR: Color = Color { r: 0.13, g: 0.77, b: 0.37, a: 1.0 };
const OUT_OF_TUNE_COLOR: Color = Color { r: 0.94, g: 0.27, b: 0.27, a: 1.0 };

pub struct CentMeter {
    /// Current cent deviation (None if no pitch detected)
    cents: Option<i32>,
    in_tune_cents: i32,
}

impl CentMeter {
    pub fn new(cents: Option<i32>, in_tune_cents: i32) -> Self {
        Self {
            cents,
            in_tune_cents,
        }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(80.0)),
        )
        .into()
    }

    fn position(cents: f32, width: f32) -> f32 {
        let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
        (clamped + METER_RANGE) / (2.0 * METER_RANGE) * width
    }
}

impl<Message> canvas::Program<Message> for CentMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgb8(0x1e, 0x29, 0x3b));

        // In-tune band around the center
        let band_left = Self::position(-(self.in_tune_cents as f32), bounds.width);
        let band_right = Self::position(self.in_tune_cents as f32, bounds.width);
        let band = Path::rectangle(
            Point::new(band_left, 0.0),
            Size::new(band_right - band_left, bounds.height),
        );
        frame.fill(&band, Color { a: 0.25, ..IN_TUNE_COLOR });

        let mut tick = -METER_RANGE;
        while tick <= METER_RANGE {
            let x = Self::position(tick, bounds.width);
            let major = tick == 0.0;
            let length = if major { bounds.height } else { bounds.height * 0.3 };
            let mark = Path::line(Point::new(x, bounds.height - length), Point::new(x, bounds.height));
            frame.stroke(
                &mark,
                Stroke::default()
                    .with_width(if major { 2.0 } else { 1.0 })
                    .with_color(Color::WHITE),
            );
            tick += TICK_STEP;
        }

        if let Some(c) = self.cents {
            let needle_pos = Self::position(c as f32, bounds.width);
            let color = if c.abs() < self.in_tune_cents {
                IN_TUNE_COLOR
            } else {
                OUT_OF_TUNE_COLOR
            };
            let needle =
                Path::rectangle(Point::new(needle_pos - 2.0, 0.0), Size::new(4.0, bounds.height));
            frame.fill(&needle, color);
        }

        vec![frame.into_geometry()]
    }
}
