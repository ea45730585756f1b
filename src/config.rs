//! Functions and structures related to configuring the `loadtester` binary.
//!
//! The session itself is described by a JSON document (see [`SessionConfig`]), read
//! from stdin by default. The options defined by [`LoadtesterConfiguration`] control
//! where that document is read from, where the result is written, logging, and
//! optionally override the document's server url, concurrency and iterations.

use gumdrop::Options;
use regex::RegexSet;
use simplelog::*;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::metrics::LoadTestResult;
use crate::session::SessionConfig;
use crate::KaskadeError;

/// How the result document is written.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputFormat {
    /// A single line of JSON (default).
    Json,
    /// Indented JSON.
    Pretty,
}
/// Allow `--format` from the command line using text variations on supported
/// `OutputFormat`s by implementing [`FromStr`].
impl FromStr for OutputFormat {
    type Err = KaskadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let formats = RegexSet::new(&[r"(?i)^(json|compact|js)$", r"(?i)^(pretty|indent|pp)$"])
            .expect("failed to compile OutputFormat RegexSet");
        let matches = formats.matches(s);
        if matches.matched(0) {
            Ok(OutputFormat::Json)
        } else if matches.matched(1) {
            Ok(OutputFormat::Pretty)
        } else {
            Err(KaskadeError::InvalidOption {
                option: format!("OutputFormat::{:?}", s),
                value: s.to_string(),
                detail: "Invalid format, expected: json or pretty".to_string(),
            })
        }
    }
}

/// Runtime options available when launching the `loadtester` binary.
///
/// Kaskade leverages [`gumdrop`](https://docs.rs/gumdrop/) to derive the help output
/// from the structure below.
#[derive(Options, Debug, Clone, Default)]
#[options(
    help = r#"Runs an HTTP session repeatedly and in parallel, reporting latency percentiles.

The session document is read from stdin unless --config is set, and the result
document is written to stdout unless --output is set.

The following runtime options are available:"#
)]
pub struct LoadtesterConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V")]
    pub version: bool,

    /// Reads the session document from NAME instead of stdin
    #[options(short = "c", meta = "NAME")]
    pub config: String,
    /// Writes the result document to NAME instead of stdout
    #[options(short = "o", meta = "NAME")]
    pub output: String,
    /// Sets result format (json, pretty)
    // Add a blank line and then an 'Overrides:' header after this option
    #[options(
        no_short,
        meta = "FORMAT",
        help = "Sets result format (json, pretty)\n\nOverrides:"
    )]
    pub format: Option<OutputFormat>,

    /// Overrides serverUrl (ie http://10.21.32.33)
    #[options(short = "H")]
    pub host: String,
    /// Overrides concurrencyNumber
    #[options(short = "u")]
    pub concurrency: Option<usize>,
    /// Overrides totalRequests
    // Add a blank line and then a 'Logging:' header after this option
    #[options(short = "i", help = "Overrides totalRequests\n\nLogging:")]
    pub iterations: Option<usize>,

    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(count, short = "v")]
    pub verbose: u8,
}
impl LoadtesterConfiguration {
    /// Read the session document from `--config` or stdin, then apply any overrides.
    pub fn load_session(&self) -> Result<SessionConfig, KaskadeError> {
        let mut session = if self.config.is_empty() {
            debug!("reading session document from stdin");
            SessionConfig::from_reader(io::stdin().lock())?
        } else {
            debug!("reading session document from {}", self.config);
            SessionConfig::from_reader(BufReader::new(File::open(&self.config)?))?
        };
        self.configure(&mut session);
        Ok(session)
    }

    /// Apply command line overrides to the session document.
    pub fn configure(&self, session: &mut SessionConfig) {
        if !self.host.is_empty() {
            info!("serverUrl = {}", self.host);
            session.server_url = self.host.clone();
        }
        if let Some(concurrency) = self.concurrency {
            info!("concurrencyNumber = {}", concurrency);
            session.concurrency = concurrency as i64;
        }
        if let Some(iterations) = self.iterations {
            info!("totalRequests = {}", iterations);
            session.iterations = iterations as i64;
        }
    }

    /// Serialize the result in the configured format.
    pub fn format_result(&self, result: &LoadTestResult) -> Result<String, KaskadeError> {
        Ok(match self.format.unwrap_or(OutputFormat::Json) {
            OutputFormat::Json => serde_json::to_string(result)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(result)?,
        })
    }

    /// Write the result to `--output` or stdout.
    pub fn write_result(&self, result: &LoadTestResult) -> Result<(), KaskadeError> {
        let document = self.format_result(result)?;
        if self.output.is_empty() {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", document)?;
            handle.flush()?;
        } else {
            let mut file = File::create(&self.output)?;
            writeln!(file, "{}", document)?;
            info!("wrote result to {}", self.output);
        }
        Ok(())
    }

    /// Initialize the logger, which writes to stderr and optionally to a log file.
    ///
    /// Stdout is reserved for the result document.
    pub fn initialize_logger(&self) {
        // Configure stderr output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                1 => LevelFilter::Warn,
                _ => LevelFilter::Error,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
        loggers.push(TermLogger::new(
            debug_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
        if let Some(path) = &log_file {
            match File::create(path) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!("failed to create log file {}: {}", path.display(), e),
            }
        }

        if let Err(e) = CombinedLogger::init(loggers) {
            eprintln!("failed to initialize CombinedLogger: {}", e);
        }

        if let Some(path) = log_file {
            info!("Writing to log file: {}", path.display());
        }
        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::RequestDefinition;

    fn parse(args: &[&str]) -> LoadtesterConfiguration {
        LoadtesterConfiguration::parse_args_default(args).unwrap()
    }

    #[test]
    fn defaults() {
        let configuration = parse(&[]);
        assert!(!configuration.help);
        assert!(configuration.config.is_empty());
        assert!(configuration.output.is_empty());
        assert_eq!(configuration.format, None);
        assert!(configuration.host.is_empty());
        assert_eq!(configuration.concurrency, None);
        assert_eq!(configuration.iterations, None);
        assert_eq!(configuration.verbose, 0);
    }

    #[test]
    fn options() {
        let configuration = parse(&[
            "--config",
            "session.json",
            "-o",
            "result.json",
            "--format",
            "Pretty",
            "-H",
            "http://127.0.0.1:8080",
            "-u",
            "8",
            "--iterations",
            "100",
            "-vv",
            "-G",
            "kaskade.log",
            "-g",
        ]);
        assert_eq!(configuration.config, "session.json");
        assert_eq!(configuration.output, "result.json");
        assert_eq!(configuration.format, Some(OutputFormat::Pretty));
        assert_eq!(configuration.host, "http://127.0.0.1:8080");
        assert_eq!(configuration.concurrency, Some(8));
        assert_eq!(configuration.iterations, Some(100));
        assert_eq!(configuration.verbose, 2);
        assert_eq!(configuration.log_file, "kaskade.log");
        assert_eq!(configuration.log_level, 1);
    }

    #[test]
    fn output_format() {
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("pretty").unwrap(), OutputFormat::Pretty);
        assert_eq!(OutputFormat::from_str("pp").unwrap(), OutputFormat::Pretty);
        assert!(OutputFormat::from_str("yaml").is_err());
        assert!(LoadtesterConfiguration::parse_args_default(&["--format", "yaml"]).is_err());
    }

    #[test]
    fn overrides() {
        let mut session = SessionConfig::new("http://example.com", 1, 1)
            .register_request(RequestDefinition::new(1, "/"));

        // No overrides leaves the document untouched.
        let original = session.clone();
        parse(&[]).configure(&mut session);
        assert_eq!(session, original);

        parse(&["--host", "http://127.0.0.1", "-u", "4", "-i", "20"]).configure(&mut session);
        assert_eq!(session.server_url, "http://127.0.0.1");
        assert_eq!(session.concurrency, 4);
        assert_eq!(session.iterations, 20);
        assert_eq!(session.requests, original.requests);
    }

    #[test]
    fn format_result() {
        let result = LoadTestResult {
            avg_time_ms: 1.5,
            success: 2,
            failures: 0,
            percentile_time_ms: None,
            request_stats: Vec::new(),
        };
        let compact = parse(&[]).format_result(&result).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.contains("\"avgTimeMs\":1.5"));

        let pretty = parse(&["--format", "pretty"]).format_result(&result).unwrap();
        assert!(pretty.contains('\n'));
        let parsed: LoadTestResult = serde_json::from_str(&pretty).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn load_session_file() {
        let path =
            std::env::temp_dir().join(format!("kaskade-session-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"serverUrl": "http://x", "concurrencyNumber": 2, "totalRequests": 4,
                "requests": [{"requestId": 1, "url": "/a", "method": "GET"}]}"#,
        )
        .unwrap();

        let path_str = path.to_str().unwrap();
        let session = parse(&["--config", path_str, "-i", "9"]).load_session().unwrap();
        assert_eq!(session.server_url, "http://x");
        assert_eq!(session.concurrency, 2);
        assert_eq!(session.iterations, 9);
        assert_eq!(session.requests.len(), 1);
        std::fs::remove_file(&path).unwrap();

        // A missing file is an io error.
        assert!(matches!(
            parse(&["--config", path_str]).load_session(),
            Err(KaskadeError::Io(_))
        ));
    }
}
