use chrono_tz::Tz;
use strum::{Display, EnumString};

use crate::PriceSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportStyle {
    Plain,
    /// `**bold**` spans, as rendered by Discord.
    #[default]
    Markdown,
}

impl ReportStyle {
    fn bold(self, text: &str) -> String {
        match self {
            ReportStyle::Plain => text.to_string(),
            ReportStyle::Markdown => format!("**{text}**"),
        }
    }
}

/// Render one block per symbol: price with two decimals and the change when it is at least one whole unit.
pub fn render_report(snapshot: &PriceSnapshot, style: ReportStyle, tz: Tz) -> String {
    let mut out = String::new();

    for (symbol, tracked) in &snapshot.symbols {
        out.push_str(&style.bold(symbol));
        out.push('\n');
        out.push_str(&format!("Price: ${:.2}\n", tracked.current));

        let change = tracked.change();
        if change.trunc() != 0.0 {
            out.push_str(&format!("Change: {change:+.2}\n"));
        }
        out.push('\n');
    }

    match snapshot.refreshed_at {
        Some(at) => {
            let local = at.with_timezone(&tz);
            out.push_str(&format!("Updated {}", local.format("%Y-%m-%d %H:%M %Z")));
        }
        None => out.push_str("No market data yet."),
    }

    out
}
