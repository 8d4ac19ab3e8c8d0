//! # Main Display Module
//!
//! Layout of the tuner screen: title, note readout, cent meter, reference
//! strings and the Start/Stop control.

use iced::widget::{Row, Space, button, column, container, text};
use iced::{Alignment, Background, Border, Color, Element, Length, Theme};
use tuner_core::TuningReading;
use tuner_core::tuning::{GUITAR_STRINGS, ReferenceString, matching_string};

use super::cent_meter::CentMeter;

const IN_TUNE_TEXT: Color = Color { r: 0.13, g: 0.77, b: 0.37, a: 1.0 };
const ACTIVE_STRING: Color = Color { r: 0.58, g: 0.2, b: 0.92, a: 1.0 };
const IDLE_STRING: Color = Color { r: 0.12, g: 0.16, b: 0.23, a: 1.0 };
const MUTED_TEXT: Color = Color { r: 0.6, g: 0.64, b: 0.7, a: 1.0 };

/// Placeholder shown while nothing is detected.
const NO_READING: &str = "--";

/// Creates the complete main application view
pub fn create_main_view(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let title = column![
        text("Acoustic Guitar Tuner").size(32),
        text("Standard Tuning (E A D G B E)").size(16).color(MUTED_TEXT),
    ]
    .align_x(Alignment::Center)
    .spacing(6);

    let content = column![
        title,
        Space::with_height(20),
        create_note_panel(data.reading),
        CentMeter::new(data.reading.map(|r| r.cents), data.in_tune_cents).view(),
        Space::with_height(10),
        create_string_row(data.reading),
        create_control_button(data.listening),
        create_status_line(data),
    ]
    .align_x(Alignment::Center)
    .spacing(16)
    .max_width(640)
    .padding(20);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Note name, frequency and in-tune marker.
fn create_note_panel(reading: Option<TuningReading>) -> Element<'static, crate::Message> {
    let Some(reading) = reading else {
        return column![text(NO_READING).size(96), text(" ").size(18)]
            .align_x(Alignment::Center)
            .into();
    };

    let note = text(reading.note_name).size(96);
    let note = if reading.in_tune {
        note.color(IN_TUNE_TEXT)
    } else {
        note
    };

    let detail = if reading.in_tune {
        format!("{:.0} Hz  ·  in tune", reading.frequency_hz)
    } else {
        format!("{:.0} Hz  ·  {:+} cents", reading.frequency_hz, reading.cents)
    };

    column![note, text(detail).size(18).color(MUTED_TEXT)]
        .align_x(Alignment::Center)
        .into()
}

/// One chip per string, highlighting the string currently being played.
fn create_string_row(reading: Option<TuningReading>) -> Element<'static, crate::Message> {
    let active = reading.and_then(|r| matching_string(r.note_name, r.frequency_hz));

    let chips = GUITAR_STRINGS
        .iter()
        .map(|string| string_chip(string, active.is_some_and(|a| std::ptr::eq(a, string))));

    Row::with_children(chips).spacing(12).into()
}

fn string_chip(string: &'static ReferenceString, highlighted: bool) -> Element<'static, crate::Message> {
    let background = if highlighted { ACTIVE_STRING } else { IDLE_STRING };
    container(text(string.note_name).size(16))
        .padding([6, 14])
        .style(move |_theme: &Theme| container::Style {
            background: Some(Background::Color(background)),
            border: Border {
                color: Color::from_rgb8(0x47, 0x55, 0x69),
                width: 1.0,
                radius: 8.0.into(),
            },
            text_color: Some(if highlighted { Color::WHITE } else { MUTED_TEXT }),
            ..container::Style::default()
        })
        .into()
}

fn create_control_button(listening: bool) -> Element<'static, crate::Message> {
    let label = if listening { "Stop Tuner" } else { "Start Tuner" };
    let control = button(text(label).size(18))
        .padding([12, 32])
        .on_press(crate::Message::ToggleListening);

    if listening {
        control.style(button::danger).into()
    } else {
        control.style(button::primary).into()
    }
}

fn create_status_line(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let status = match (&data.error, data.listening) {
        (Some(error), _) => format!("Tuner off: {error}"),
        (None, true) => "Listening...".to_string(),
        (None, false) => "Press Start and pluck a string".to_string(),
    };
    text(status).size(14).color(MUTED_TEXT).into()
}
