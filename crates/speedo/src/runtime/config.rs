use speedo_core::{ParsePolicyError, RefreshPolicy};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },
    #[error(transparent)]
    Policy(#[from] ParsePolicyError),
    #[error("unknown option '{0}' (see --help)")]
    UnknownOption(String),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub fps: u32,
    pub refresh: RefreshPolicy,
    pub warmup_s: f64,
    pub cruise_mph: f64,
    pub report_every: u64,
    pub hidden: bool,
    pub json_logs: bool,
    pub log_file: Option<PathBuf>,
    pub display_log: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    /// Seconds into the run at which the simulated signal drops out.
    pub drop_signal_at: Option<f64>,
    pub drop_signal_for: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            fps: 60,
            refresh: RefreshPolicy::OnChange,
            warmup_s: 2.0,
            cruise_mph: 30.0,
            report_every: 60,
            hidden: false,
            json_logs: false,
            log_file: None,
            display_log: None,
            metrics_addr: None,
            drop_signal_at: None,
            drop_signal_for: 3.0,
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, ConfigError> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_value<T: FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, ConfigError> {
    let raw = value(args, i, flag)?;
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: raw.to_string(),
    })
}

fn non_negative(flag: &str, v: f64) -> Result<f64, ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(ConfigError::InvalidValue {
            flag: flag.to_string(),
            value: v.to_string(),
        })
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--run-seconds" => {
                    cfg.run_seconds = Some(parse_value(args, i, flag)?);
                    i += 1;
                }
                "--fps" => {
                    let fps: u32 = parse_value(args, i, flag)?;
                    if fps == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: flag.to_string(),
                            value: "0".to_string(),
                        });
                    }
                    cfg.fps = fps;
                    i += 1;
                }
                "--refresh" => {
                    cfg.refresh = value(args, i, flag)?.parse()?;
                    i += 1;
                }
                "--warmup" => {
                    cfg.warmup_s = non_negative(flag, parse_value(args, i, flag)?)?;
                    i += 1;
                }
                "--cruise-mph" => {
                    cfg.cruise_mph = non_negative(flag, parse_value(args, i, flag)?)?;
                    i += 1;
                }
                "--report-every" => {
                    cfg.report_every = parse_value(args, i, flag)?;
                    i += 1;
                }
                "--hidden" => {
                    cfg.hidden = true;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-file" => {
                    cfg.log_file = Some(PathBuf::from(value(args, i, flag)?));
                    i += 1;
                }
                "--display-log" => {
                    cfg.display_log = Some(PathBuf::from(value(args, i, flag)?));
                    i += 1;
                }
                "--metrics-addr" => {
                    cfg.metrics_addr = Some(value(args, i, flag)?.to_string());
                    i += 1;
                }
                "--drop-signal-at" => {
                    cfg.drop_signal_at = Some(non_negative(flag, parse_value(args, i, flag)?)?);
                    i += 1;
                }
                "--drop-signal-for" => {
                    cfg.drop_signal_for = non_negative(flag, parse_value(args, i, flag)?)?;
                    i += 1;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
            i += 1;
        }
        Ok(cfg)
    }

    pub fn print_help() {
        println!(
            r#"speedo - on-screen speed readout driven by a simulated location provider

USAGE:
    speedo [OPTIONS]

OPTIONS:
    --fps <N>               Frames per second delivered to components [default: 60]
    --run-seconds <SECS>    Run for a fixed duration then exit
    --refresh <POLICY>      When to rewrite the readout (on-change|always) [default: on-change]
    --warmup <SECS>         Seconds before the simulated location resolves [default: 2]
    --cruise-mph <MPH>      Cruise speed of the simulated drive cycle [default: 30]
    --report-every <FRAMES> Log the current speed every N frames while moving [default: 60]
    --hidden                Start with the readout hidden
    --json-logs             Output logs in JSON format (for log aggregation)
    --log-file <PATH>       Write logs to a file instead of stderr
    --display-log <PATH>    Append every readout change to a JSONL file
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 127.0.0.1:9090)
    --drop-signal-at <SECS> Drop the simulated positioning signal at this time
    --drop-signal-for <SECS> Length of the signal dropout [default: 3]
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,speedo_core=trace)

EXAMPLES:
    # Ten second run recording the readout
    speedo --run-seconds 10 --display-log ./display.jsonl

    # Redraw on every frame with metrics exposed
    speedo --refresh always --metrics-addr 127.0.0.1:9090
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("speedo")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_without_flags() {
        let cfg = RuntimeConfig::from_args(&args(&[])).unwrap();
        assert_eq!(cfg.fps, 60);
        assert_eq!(cfg.refresh, RefreshPolicy::OnChange);
        assert!(cfg.run_seconds.is_none());
        assert!(!cfg.show_help);
    }

    #[test]
    fn parses_all_flags() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--run-seconds",
            "3",
            "--fps",
            "30",
            "--refresh",
            "always",
            "--warmup",
            "0.5",
            "--cruise-mph",
            "45",
            "--report-every",
            "10",
            "--hidden",
            "--json-logs",
            "--log-file",
            "logs/speedo.log",
            "--display-log",
            "display.jsonl",
            "--metrics-addr",
            "127.0.0.1:9090",
        ]))
        .unwrap();

        assert_eq!(cfg.run_seconds, Some(3));
        assert_eq!(cfg.fps, 30);
        assert_eq!(cfg.refresh, RefreshPolicy::Always);
        assert_eq!(cfg.warmup_s, 0.5);
        assert_eq!(cfg.cruise_mph, 45.0);
        assert_eq!(cfg.report_every, 10);
        assert!(cfg.hidden && cfg.json_logs);
        assert_eq!(cfg.log_file, Some(PathBuf::from("logs/speedo.log")));
        assert_eq!(cfg.display_log, Some(PathBuf::from("display.jsonl")));
        assert_eq!(cfg.metrics_addr.as_deref(), Some("127.0.0.1:9090"));
    }

    #[test]
    fn parses_signal_dropout() {
        let cfg = RuntimeConfig::from_args(&args(&["--drop-signal-at", "4"])).unwrap();
        assert_eq!(cfg.drop_signal_at, Some(4.0));
        assert_eq!(cfg.drop_signal_for, 3.0);

        let cfg = RuntimeConfig::from_args(&args(&[
            "--drop-signal-at",
            "1.5",
            "--drop-signal-for",
            "0.5",
        ]))
        .unwrap();
        assert_eq!(cfg.drop_signal_at, Some(1.5));
        assert_eq!(cfg.drop_signal_for, 0.5);

        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--drop-signal-at", "-2"])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn help_stops_parsing() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--bogus"])).unwrap();
        assert!(cfg.show_help);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--fps"])),
            Err(ConfigError::MissingValue(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--fps", "0"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--warmup", "-1"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--refresh", "never"])),
            Err(ConfigError::Policy(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--bind", "x"])),
            Err(ConfigError::UnknownOption(_))
        ));
    }
}
