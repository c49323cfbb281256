use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const CLOCK: [&str; 12] = ["🕛 ", "🕐 ", "🕑 ", "🕒 ", "🕓 ", "🕔 ", "🕕 ", "🕖 ", "🕗 ", "🕘 ", "🕙 ", "🕚 "];

/// A ticking spinner for calls that go out to the registries.
pub fn spinner<S: Into<String>>(message: S) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:5} {msg} [{elapsed}]") {
        pb.set_style(style.tick_strings(&CLOCK));
    }
    pb.set_message(message.into());
    pb
}
