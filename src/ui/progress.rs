/// Progress panel
/// Shows the latest snapshot of a running (or finished) generation
use iced::widget::{column, progress_bar, text};
use iced::Element;
use rgb_generator::generate::{format_duration, ProgressSnapshot};

use crate::Message;

pub fn progress_panel(snapshot: Option<&ProgressSnapshot>) -> Element<'_, Message> {
    let Some(snap) = snapshot else {
        return column![
            text("Progress: 0/0 images generated.").size(14),
            progress_bar(0.0..=100.0, 0.0),
        ]
        .spacing(6)
        .into();
    };

    let remaining = snap
        .estimated_remaining_seconds
        .map(format_duration)
        .unwrap_or_else(|| "unknown".to_string());

    column![
        text(format!(
            "Progress: {}/{}  Remaining time: {}",
            snap.images_generated, snap.total_images, remaining
        ))
        .size(14),
        progress_bar(0.0..=100.0, snap.percent()),
        text(format!("Images per second: {:.2}", snap.images_per_second)).size(14),
        text(format!("Elapsed time: {}", format_duration(snap.elapsed_seconds))).size(14),
        text(format!(
            "Skipped images: {}  Failed: {}",
            snap.images_skipped, snap.images_failed
        ))
        .size(14),
    ]
    .spacing(6)
    .into()
}
