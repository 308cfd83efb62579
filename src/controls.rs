//! Runtime controls for a live session, one command per line:
//! `draw`, `erase`, `idle`, `clear`, `color r,g,b`, `thickness n`.

use crate::cli::parse_rgb;
use crate::error::EngineError;
use crate::trail::TrailMode;
use image::Rgb;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Mode(TrailMode),
    Clear,
    Color(Rgb<u8>),
    Thickness(u32),
}

impl FromStr for Control {
    type Err = EngineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();
        if words.next().is_some() {
            return Err(EngineError::config(format!("too many arguments in {line:?}")));
        }
        let control = match (command.as_str(), arg) {
            ("draw", None) => Control::Mode(TrailMode::Drawing),
            ("erase", None) => Control::Mode(TrailMode::Erasing),
            ("idle", None) => Control::Mode(TrailMode::Idle),
            ("clear", None) => Control::Clear,
            ("color", Some(rgb)) => Control::Color(parse_rgb(rgb).map_err(EngineError::config)?),
            ("thickness", Some(n)) => {
                let n: u32 = n
                    .parse()
                    .map_err(|e| EngineError::config(format!("thickness {n:?}: {e}")))?;
                if n == 0 {
                    return Err(EngineError::config("thickness must be at least 1"));
                }
                Control::Thickness(n)
            }
            _ => return Err(EngineError::config(format!("unknown control {line:?}"))),
        };
        Ok(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        assert_eq!("draw".parse::<Control>().unwrap(), Control::Mode(TrailMode::Drawing));
        assert_eq!(" Erase ".parse::<Control>().unwrap(), Control::Mode(TrailMode::Erasing));
        assert_eq!("idle".parse::<Control>().unwrap(), Control::Mode(TrailMode::Idle));
        assert_eq!("clear".parse::<Control>().unwrap(), Control::Clear);
        assert_eq!(
            "color 255,0,10".parse::<Control>().unwrap(),
            Control::Color(Rgb([255, 0, 10]))
        );
        assert_eq!("thickness 7".parse::<Control>().unwrap(), Control::Thickness(7));
    }

    #[test]
    fn malformed_commands_rejected() {
        for line in ["", "paint", "clear now", "color", "color 1,2", "thickness 0", "thickness x"] {
            assert!(line.parse::<Control>().is_err(), "{line:?} should not parse");
        }
    }
}
