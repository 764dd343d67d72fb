//! Command-line interface for millwright

use argh::FromArgs;

/// Manages the components of the test-data pipeline
#[derive(FromArgs, Debug)]
pub struct MillwrightArgs {
    /// log level (error, warn, info, debug, trace)
    #[argh(option, short = 'l', default = "String::from(\"info\")")]
    pub log_level: String,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Command {
    Start(StartArgs),
    Validate(ValidateArgs),
    Destroy(DestroyArgs),
    Kill(KillArgs),
    Inspect(InspectArgs),
}

/// Start the data processing pipeline and monitor it
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "start")]
pub struct StartArgs {
    /// interrupt preceding millwrights
    #[argh(switch)]
    pub force: bool,

    /// pipeline file (default: built-in pipeline)
    #[argh(option, short = 'p')]
    pub pipeline: Option<String>,
}

/// Validate the pipeline and print the launch order
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "validate")]
pub struct ValidateArgs {
    /// pipeline file (default: built-in pipeline)
    #[argh(option, short = 'p')]
    pub pipeline: Option<String>,
}

/// Remove all resources created by millwright
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "destroy")]
pub struct DestroyArgs {
    /// label used for resources (format: key=value, default: the pipeline's
    /// label, used-by=millwright)
    #[argh(option, from_str_fn(parse_label))]
    pub label: Option<String>,

    /// pipeline file whose settings name the resources (default: built-in)
    #[argh(option, short = 'p')]
    pub pipeline: Option<String>,
}

/// Remove a component's container by force
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "kill")]
pub struct KillArgs {
    /// component name
    #[argh(positional)]
    pub name: String,

    /// pipeline file whose settings name the resources (default: built-in)
    #[argh(option, short = 'p')]
    pub pipeline: Option<String>,
}

/// Display the published variables of a component
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "inspect")]
pub struct InspectArgs {
    /// component name
    #[argh(positional)]
    pub name: String,

    /// internal diagnostics port (default: 8089)
    #[argh(option, short = 'p', default = "8089")]
    pub port: u16,
}

/// Parse a label filter in format "key=value"
fn parse_label(s: &str) -> Result<String, String> {
    match s.split_once('=') {
        Some((key, _)) if !key.is_empty() => Ok(s.to_string()),
        _ => Err(format!(
            "Invalid label format '{}'. Expected 'key=value'",
            s
        )),
    }
}

impl MillwrightArgs {
    /// Normalised log level for env_logger
    pub fn log_filter(&self) -> &'static str {
        match self.log_level.to_lowercase().as_str() {
            "error" => "error",
            "warn" => "warn",
            "debug" => "debug",
            "trace" => "trace",
            _ => "info",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<MillwrightArgs, argh::EarlyExit> {
        MillwrightArgs::from_args(&["millwright"], args)
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("used-by=other"), Ok("used-by=other".to_string()));
        assert!(parse_label("nolabel").is_err());
        assert!(parse_label("=x").is_err());
    }

    #[test]
    fn test_start_force() {
        let args = parse(&["start", "--force"]).unwrap();
        match args.command {
            Command::Start(start) => {
                assert!(start.force);
                assert!(start.pipeline.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_destroy_default_label() {
        let args = parse(&["destroy"]).unwrap();
        match args.command {
            Command::Destroy(destroy) => {
                assert!(destroy.label.is_none());
                assert!(destroy.pipeline.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_destroy_and_kill_accept_pipeline() {
        let args = parse(&["destroy", "-p", "pipeline.yaml", "--label", "used-by=ci"]).unwrap();
        match args.command {
            Command::Destroy(destroy) => {
                assert_eq!(destroy.label.as_deref(), Some("used-by=ci"));
                assert_eq!(destroy.pipeline.as_deref(), Some("pipeline.yaml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = parse(&["kill", "ingestion", "-p", "pipeline.yaml"]).unwrap();
        match args.command {
            Command::Kill(kill) => {
                assert_eq!(kill.name, "ingestion");
                assert_eq!(kill.pipeline.as_deref(), Some("pipeline.yaml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_inspect_requires_name() {
        assert!(parse(&["inspect"]).is_err());
        let args = parse(&["-l", "DEBUG", "inspect", "ingestion", "--port", "9000"]).unwrap();
        assert_eq!(args.log_filter(), "debug");
        match args.command {
            Command::Inspect(inspect) => {
                assert_eq!(inspect.name, "ingestion");
                assert_eq!(inspect.port, 9000);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
