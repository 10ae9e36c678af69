use crate::config::ConfigError;
use crate::models::{ModeFlag, Plane, ScannerSource, Threshold, Trigger, UnitSystem};
use camino::Utf8PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// One operator request, as raised by a control surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// A lifecycle trigger. `save` may carry a destination override.
    Lifecycle {
        trigger: Trigger,
        destination: Option<Utf8PathBuf>,
    },
    SetSource(ScannerSource),
    SetInputDirectory(Utf8PathBuf),
    SetOutputDirectory(Utf8PathBuf),
    SetUnits(UnitSystem),
    SetThreshold(Threshold, f32),
    SetPlane(Plane, f32),
    SetVoxelSize(f32),
    SetScanVolumeSize(f32),
    SetModeFlag(ModeFlag, bool),
    ListSources,
    ListUnits,
    Status,
    Quit,
}

impl Intent {
    pub fn trigger(trigger: Trigger) -> Self {
        Intent::Lifecycle {
            trigger,
            destination: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum IntentParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("'{command}' takes no more than {max} argument(s)")]
    TooManyArguments { command: &'static str, max: usize },

    #[error("'{value}' is not a number")]
    InvalidNumber { value: String },

    #[error("'{value}' is not on or off")]
    InvalidSwitch { value: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Splits a command line into its words and hands them out one at a time.
struct Words<'a> {
    command: &'static str,
    rest: std::str::SplitWhitespace<'a>,
}

impl<'a> Words<'a> {
    fn required(&mut self, expected: &'static str) -> Result<&'a str, IntentParseError> {
        self.rest.next().ok_or(IntentParseError::MissingArgument {
            command: self.command,
            expected,
        })
    }

    fn optional(&mut self) -> Option<&'a str> {
        self.rest.next()
    }

    fn number(&mut self) -> Result<f32, IntentParseError> {
        let value = self.required("a number")?;
        value.parse().map_err(|_| IntentParseError::InvalidNumber {
            value: value.to_string(),
        })
    }

    fn switch(&mut self) -> Result<bool, IntentParseError> {
        match self.required("on or off")?.to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            other => Err(IntentParseError::InvalidSwitch {
                value: other.to_string(),
            }),
        }
    }

    fn finish<T>(mut self, intent: T, max: usize) -> Result<T, IntentParseError> {
        match self.rest.next() {
            Some(_) => Err(IntentParseError::TooManyArguments {
                command: self.command,
                max,
            }),
            None => Ok(intent),
        }
    }
}

impl FromStr for Intent {
    type Err = IntentParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let head = parts.next().ok_or(IntentParseError::Empty)?;
        let lowered = head.to_ascii_lowercase();

        let command: &'static str = match lowered.as_str() {
            "init" => "init",
            "preview" => "preview",
            "start" => "start",
            "stop" => "stop",
            "mesh" => "mesh",
            "save" => "save",
            "source" => "source",
            "input" => "input",
            "output" => "output",
            "units" => "units",
            "normal" => "normal",
            "distance" => "distance",
            "near" => "near",
            "far" => "far",
            "voxel" => "voxel",
            "scan-size" => "scan-size",
            "unbounded" => "unbounded",
            "save-frames" => "save-frames",
            "sources" => "sources",
            "units?" => "units?",
            "status" => "status",
            "quit" | "exit" => "quit",
            _ => return Err(IntentParseError::UnknownCommand(head.to_string())),
        };
        let mut words = Words {
            command,
            rest: parts,
        };

        match command {
            "init" => words.finish(Intent::trigger(Trigger::Init), 0),
            "preview" => words.finish(Intent::trigger(Trigger::Preview), 0),
            "start" => words.finish(Intent::trigger(Trigger::Start), 0),
            "stop" => words.finish(Intent::trigger(Trigger::Stop), 0),
            "mesh" => words.finish(Intent::trigger(Trigger::Mesh), 0),
            "save" => {
                let destination = words.optional().map(Utf8PathBuf::from);
                words.finish(
                    Intent::Lifecycle {
                        trigger: Trigger::Save,
                        destination,
                    },
                    1,
                )
            }
            "source" => {
                let source = ScannerSource::parse(words.required("a source name")?)?;
                words.finish(Intent::SetSource(source), 1)
            }
            "input" => {
                let dir = Utf8PathBuf::from(words.required("a directory")?);
                words.finish(Intent::SetInputDirectory(dir), 1)
            }
            "output" => {
                let dir = Utf8PathBuf::from(words.required("a directory")?);
                words.finish(Intent::SetOutputDirectory(dir), 1)
            }
            "units" => {
                let sensor = words.required("a sensor and a scanning unit")?;
                let scanning = words.required("a sensor and a scanning unit")?;
                let units = UnitSystem::parse(sensor, scanning)?;
                words.finish(Intent::SetUnits(units), 2)
            }
            "normal" => {
                let value = words.number()?;
                words.finish(Intent::SetThreshold(Threshold::Normal, value), 1)
            }
            "distance" => {
                let value = words.number()?;
                words.finish(Intent::SetThreshold(Threshold::Distance, value), 1)
            }
            "near" => {
                let value = words.number()?;
                words.finish(Intent::SetPlane(Plane::Near, value), 1)
            }
            "far" => {
                let value = words.number()?;
                words.finish(Intent::SetPlane(Plane::Far, value), 1)
            }
            "voxel" => {
                let value = words.number()?;
                words.finish(Intent::SetVoxelSize(value), 1)
            }
            "scan-size" => {
                let value = words.number()?;
                words.finish(Intent::SetScanVolumeSize(value), 1)
            }
            "unbounded" => {
                let enabled = words.switch()?;
                words.finish(Intent::SetModeFlag(ModeFlag::Unbounded, enabled), 1)
            }
            "save-frames" => {
                let enabled = words.switch()?;
                words.finish(Intent::SetModeFlag(ModeFlag::SaveInputFrames, enabled), 1)
            }
            "sources" => words.finish(Intent::ListSources, 0),
            "units?" => words.finish(Intent::ListUnits, 0),
            "status" => words.finish(Intent::Status, 0),
            _ => words.finish(Intent::Quit, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DistanceUnit;

    fn parse(line: &str) -> Intent {
        line.parse().unwrap()
    }

    #[test]
    fn test_lifecycle_commands() {
        assert_eq!(parse("init"), Intent::trigger(Trigger::Init));
        assert_eq!(parse("  START  "), Intent::trigger(Trigger::Start));
        assert_eq!(parse("save"), Intent::trigger(Trigger::Save));
        assert_eq!(
            parse("save /tmp/out.ply"),
            Intent::Lifecycle {
                trigger: Trigger::Save,
                destination: Some(Utf8PathBuf::from("/tmp/out.ply")),
            }
        );
    }

    #[test]
    fn test_field_commands() {
        assert_eq!(parse("source file"), Intent::SetSource(ScannerSource::File));
        assert_eq!(
            parse("input /data/frames"),
            Intent::SetInputDirectory(Utf8PathBuf::from("/data/frames"))
        );
        assert_eq!(
            parse("units cm feet"),
            Intent::SetUnits(UnitSystem::new(DistanceUnit::Centimeters, DistanceUnit::Feet))
        );
        assert_eq!(parse("voxel 0.003"), Intent::SetVoxelSize(0.003));
        assert_eq!(parse("near -1"), Intent::SetPlane(Plane::Near, -1.0));
        assert_eq!(
            parse("distance 0.01"),
            Intent::SetThreshold(Threshold::Distance, 0.01)
        );
        assert_eq!(
            parse("save-frames ON"),
            Intent::SetModeFlag(ModeFlag::SaveInputFrames, true)
        );
        assert_eq!(parse("unbounded off"), Intent::SetModeFlag(ModeFlag::Unbounded, false));
    }

    #[test]
    fn test_queries() {
        assert_eq!(parse("sources"), Intent::ListSources);
        assert_eq!(parse("units?"), Intent::ListUnits);
        assert_eq!(parse("status"), Intent::Status);
        assert_eq!(parse("exit"), Intent::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("".parse::<Intent>(), Err(IntentParseError::Empty)));
        assert!(matches!(
            "calibrate".parse::<Intent>(),
            Err(IntentParseError::UnknownCommand(c)) if c == "calibrate"
        ));
        assert!(matches!(
            "voxel".parse::<Intent>(),
            Err(IntentParseError::MissingArgument { command: "voxel", .. })
        ));
        assert!(matches!(
            "voxel tiny".parse::<Intent>(),
            Err(IntentParseError::InvalidNumber { .. })
        ));
        assert!(matches!(
            "unbounded maybe".parse::<Intent>(),
            Err(IntentParseError::InvalidSwitch { .. })
        ));
        assert!(matches!(
            "init now".parse::<Intent>(),
            Err(IntentParseError::TooManyArguments { command: "init", max: 0 })
        ));
    }

    #[test]
    fn test_bad_unit_rejects_whole_pair() {
        let err = "units mm parsecs".parse::<Intent>().unwrap_err();
        assert!(matches!(
            err,
            IntentParseError::Config(ConfigError::UnknownUnit(ref u)) if u == "parsecs"
        ));
    }

    #[test]
    fn test_non_finite_numbers_parse_but_are_caught_later() {
        // f32 parsing accepts "nan" and "inf"; the configuration setters reject them
        assert!(matches!(parse("voxel nan"), Intent::SetVoxelSize(v) if v.is_nan()));
    }
}
