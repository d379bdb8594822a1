//! Terminal style roles for the report table and `--help` output
//!
//! Each logical role maps to one `colored::Color`. Colouring is applied only
//! when the caller passes `enabled`, so there is no global colour state.
//!
//! ```
//! use pcq::core::styles::StyleRole;
//! assert_eq!(StyleRole::Header.paint("Mode", false), "Mode");
//! assert!(StyleRole::Header.paint("Mode", true).starts_with("\x1b[33m"));
//! ```

use clap::builder::styling::AnsiColor;
use colored::Color;

use crate::queue::TaskResult;

macro_rules! style {
    ( $( $variant:ident => $color:expr ),+ $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum StyleRole { $( $variant ),+ }

        impl StyleRole {
            pub fn color(self) -> Option<Color> {
                match self { $( StyleRole::$variant => $color ),+ }
            }
        }
    }
}

style! {
    Header  => Some(Color::Yellow),
    Mode    => Some(Color::Cyan),
    Good    => Some(Color::Green),
    Bad     => Some(Color::BrightRed),
    Warning => Some(Color::Magenta),
    Value   => None,
    Dim     => Some(Color::BrightBlack),
}

impl StyleRole {
    /// Role used to display an item outcome
    pub fn for_result(result: TaskResult) -> Self {
        match result {
            TaskResult::Success => StyleRole::Good,
            TaskResult::Error => StyleRole::Bad,
            TaskResult::Timeout | TaskResult::Canceled => StyleRole::Warning,
            TaskResult::None => StyleRole::Dim,
        }
    }

    pub fn paint(self, text: &str, enabled: bool) -> String {
        match self.color().and_then(ansi_code).filter(|_| enabled) {
            Some(code) => format!("\x1b[{}m{}\x1b[0m", code, text),
            None => text.to_string(),
        }
    }

    /// prettytable style spec (`F<c>` foreground) for this role
    pub fn table_spec(self) -> Option<&'static str> {
        Some(match self.color()? {
            Color::Red => "Fr",
            Color::Green => "Fg",
            Color::Yellow => "Fy",
            Color::Blue => "Fb",
            Color::Magenta => "Fm",
            Color::Cyan => "Fc",
            Color::White => "Fw",
            Color::BrightBlack => "FK",
            Color::BrightRed => "FR",
            Color::BrightGreen => "FG",
            Color::BrightYellow => "FY",
            _ => return None,
        })
    }
}

fn ansi_code(color: Color) -> Option<u8> {
    Some(match color {
        Color::Black => 30,
        Color::Red => 31,
        Color::Green => 32,
        Color::Yellow => 33,
        Color::Blue => 34,
        Color::Magenta => 35,
        Color::Cyan => 36,
        Color::White => 37,
        Color::BrightBlack => 90,
        Color::BrightRed => 91,
        Color::BrightGreen => 92,
        Color::BrightYellow => 93,
        Color::BrightBlue => 94,
        Color::BrightMagenta => 95,
        Color::BrightCyan => 96,
        Color::BrightWhite => 97,
        _ => return None,
    })
}

fn clap_color(color: Color) -> Option<AnsiColor> {
    Some(match color {
        Color::Red => AnsiColor::Red,
        Color::Green => AnsiColor::Green,
        Color::Yellow => AnsiColor::Yellow,
        Color::Magenta => AnsiColor::Magenta,
        Color::Cyan => AnsiColor::Cyan,
        Color::BrightBlack => AnsiColor::BrightBlack,
        Color::BrightRed => AnsiColor::BrightRed,
        _ => return None,
    })
}

/// clap help styles built from the same roles
pub fn help_styles(enabled: bool) -> clap::builder::Styles {
    use clap::builder::styling::{Color as ClapColor, Style};
    if !enabled {
        return clap::builder::Styles::plain();
    }

    let style = |role: StyleRole, bold: bool| {
        let mut s = Style::new();
        if let Some(col) = role.color().and_then(clap_color) {
            s = s.fg_color(Some(ClapColor::Ansi(col)));
        }
        if bold {
            s = s.bold();
        }
        s
    };

    clap::builder::Styles::styled()
        .header(style(StyleRole::Header, true))
        .usage(style(StyleRole::Header, true))
        .literal(style(StyleRole::Mode, false))
        .placeholder(style(StyleRole::Good, false))
        .error(style(StyleRole::Bad, true))
}
