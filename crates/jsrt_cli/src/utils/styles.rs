use anstyle::{AnsiColor, Color, Style};
use clap::builder::Styles;

const fn fg(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(color)))
}

pub fn get_styles() -> Styles {
    let heading = fg(AnsiColor::Yellow).bold().underline();
    let problem = fg(AnsiColor::Red).bold();
    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(fg(AnsiColor::Cyan))
        .invalid(problem)
        .error(problem)
        .placeholder(fg(AnsiColor::White))
}

fn paint(msg: &str, style: Style) -> String {
    format!("{style}{msg}{style:#}")
}

pub(crate) fn fmt_bold(msg: &str) -> String {
    paint(msg, Style::new().bold())
}

pub(crate) fn fmt_dimmed(msg: &str) -> String {
    paint(msg, Style::new().dimmed())
}

/// A green check mark in front of `msg`.
pub(crate) fn fmt_success(msg: &str) -> String {
    format!("{} {msg}", paint("✔", fg(AnsiColor::Green)))
}
