use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use rosetta_api::{Destination, FieldOverrides, OutputFormat, Transport};
use rosetta_engine::{Coordinator, Engine};

use crate::config::ServeArgs;
use crate::error::CliError;

const HELP: &str = "\
Commands:
  s                      send last transformed message
  a                      toggle auto-forward
  r                      re-transform last message with current settings
  f <format>             output format (simdis | cot | json | raw)
  t <file>               use a custom template file
  o [key=value ...]      set overrides (uid, lat, lon, alt); none clears
  i [file]               transform <file> instead of inbound payloads; none clears
  d <tcp|udp> <host> <port>  change destination
  m                      show counters
  q                      quit";

/// One operator command from stdin.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Send,
    ToggleAuto,
    Retransform,
    Format(OutputFormat),
    Template(String),
    Overrides(FieldOverrides),
    InputOverride(Option<String>),
    Destination(Destination),
    Metrics,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Command::Help);
        };
        let rest: Vec<&str> = words.collect();

        match (head, rest.as_slice()) {
            ("s" | "send", []) => Ok(Command::Send),
            ("a" | "auto", []) => Ok(Command::ToggleAuto),
            ("r" | "retransform", []) => Ok(Command::Retransform),
            ("f" | "format", [name]) => OutputFormat::from_name(name, None).map(Command::Format),
            ("t" | "template", [path]) => Ok(Command::Template((*path).to_string())),
            ("o" | "overrides", pairs) => parse_overrides(pairs).map(Command::Overrides),
            ("i" | "input", []) => Ok(Command::InputOverride(None)),
            ("i" | "input", [path]) => Ok(Command::InputOverride(Some((*path).to_string()))),
            ("d" | "dest", [transport, host, port]) => {
                let transport: Transport = transport.parse()?;
                let port: u16 = port.parse().map_err(|_| format!("bad port '{port}'"))?;
                Ok(Command::Destination(Destination::new(transport, *host, port)))
            }
            ("m" | "metrics", []) => Ok(Command::Metrics),
            ("h" | "help" | "?", _) => Ok(Command::Help),
            ("q" | "quit", []) => Ok(Command::Quit),
            _ => Err(format!("unknown command '{}'", line.trim())),
        }
    }
}

fn parse_overrides(pairs: &[&str]) -> Result<FieldOverrides, String> {
    let mut overrides = FieldOverrides::none();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| format!("expected key=value, got '{pair}'"))?;
        overrides = match key {
            "uid" => overrides.with_uid(value),
            "lat" => overrides.with_lat(value),
            "lon" => overrides.with_lon(value),
            "alt" => overrides.with_alt(value),
            other => return Err(format!("unknown override '{other}'")),
        };
    }
    Ok(overrides)
}

pub async fn run(args: ServeArgs) -> Result<(), CliError> {
    tracing::info!("rosetta-server starting");

    // --- Config ---
    let config = args.resolve()?;

    // --- Engine ---
    let engine = Engine::bootstrap(config).await?;
    tracing::info!(addr = %engine.local_addr(), "server ready");

    println!("Listening on UDP {}", engine.local_addr());
    println!("{HELP}");
    println!();

    let coordinator = engine.coordinator().clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    // No operator attached: keep relaying until Ctrl+C.
                    stdin_open = false;
                    tracing::info!("stdin closed, Ctrl+C to stop");
                    continue;
                };
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            println!();
                            break;
                        }
                        _ = dispatch(&coordinator, command) => {}
                    },
                    Err(e) => println!("  {e} (h for help)"),
                }
            }
        }
    }

    engine.shutdown().await;
    println!("Bye!");
    Ok(())
}

/// Commands may block on a TCP connect or store I/O, so they run on the
/// blocking pool and the caller stays free to watch for Ctrl+C.
async fn dispatch(coordinator: &Arc<Coordinator>, command: Command) {
    let coordinator = coordinator.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || execute(&coordinator, command)).await {
        tracing::error!(error = %e, "operator command failed");
    }
}

fn execute(coordinator: &Coordinator, command: Command) {
    match command {
        Command::Send => match coordinator.send_last() {
            Ok(()) => {
                let dest = coordinator.destination().map(|d| d.to_string()).unwrap_or_default();
                println!("  sent via {dest}");
            }
            Err(e) => println!("  send failed: {e}"),
        },
        Command::ToggleAuto => {
            let enabled = coordinator.toggle_auto_forward();
            println!("  auto-forward {}", if enabled { "on" } else { "off" });
        }
        Command::Retransform => match coordinator.retransform_last() {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => println!("  {e}"),
        },
        Command::Format(format) => {
            println!("  format: {format}");
            coordinator.set_format(format);
        }
        Command::Template(path) => match load_template(Path::new(&path)) {
            Ok(format) => {
                coordinator.set_format(format);
                println!("  format: custom template from {path}");
            }
            Err(e) => println!("  {e}"),
        },
        Command::Overrides(overrides) => {
            println!("  overrides: {}", describe_overrides(&overrides));
            coordinator.set_overrides(overrides);
        }
        Command::InputOverride(None) => {
            coordinator.set_input_override(None);
            println!("  input override cleared");
        }
        Command::InputOverride(Some(path)) => match std::fs::read_to_string(&path) {
            Ok(document) => {
                coordinator.set_input_override(Some(document));
                println!("  transforming {path} in place of inbound payloads");
            }
            Err(e) => println!("  {path}: {e}"),
        },
        Command::Destination(destination) => {
            println!("  destination: {destination}");
            coordinator.set_destination(Some(destination));
        }
        Command::Metrics => {
            let settings = coordinator.settings();
            let m = coordinator.metrics().snapshot();
            println!(
                "  received {}  transformed {}  forwarded {}  errors {}  manual sent {}  manual failed {}",
                m.received, m.transformed, m.forwarded, m.errors, m.manual_sends, m.manual_failures
            );
            println!(
                "  format {}  auto-forward {}  overrides {}",
                settings.format,
                if settings.auto_forward { "on" } else { "off" },
                describe_overrides(&settings.overrides)
            );
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn load_template(path: &Path) -> Result<OutputFormat, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    rosetta_format::Template::parse(&text).map_err(|e| e.to_string())?;
    Ok(OutputFormat::CustomTemplate(text))
}

fn describe_overrides(o: &FieldOverrides) -> String {
    if o.is_empty() {
        return "none".to_string();
    }
    [("uid", &o.uid), ("lat", &o.lat), ("lon", &o.lon), ("alt", &o.alt)]
        .iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| format!("{k}={v}")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rosetta_api::{Record, RecordId, RecordStatus, RecordStore, StoreError};
    use rosetta_engine::{InboundPacket, MemoryRecordStore, PipelineSettings, TracingDiagnostics};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("s", Command::Send)]
    #[case("a", Command::ToggleAuto)]
    #[case("r", Command::Retransform)]
    #[case("f cot", Command::Format(OutputFormat::CotXml))]
    #[case("format JSON", Command::Format(OutputFormat::Json))]
    #[case("m", Command::Metrics)]
    #[case("", Command::Help)]
    #[case("q", Command::Quit)]
    #[case("i", Command::InputOverride(None))]
    #[case("d udp 10.0.0.2 6000", Command::Destination(Destination::udp("10.0.0.2", 6000)))]
    fn parses_commands(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(line).unwrap(), expected);
    }

    #[test]
    fn parses_overrides() {
        let Command::Overrides(o) = Command::parse("o uid=B2 alt=999").unwrap() else {
            panic!("not an overrides command");
        };
        assert_eq!(o, FieldOverrides::none().with_uid("B2").with_alt("999"));
        assert_eq!(describe_overrides(&o), "uid=B2 alt=999");
        assert_eq!(Command::parse("o").unwrap(), Command::Overrides(FieldOverrides::none()));
    }

    #[rstest]
    #[case("x")]
    #[case("f yaml")]
    #[case("f template")]
    #[case("s now")]
    #[case("o speed=5")]
    #[case("o uid")]
    #[case("d tcp host notaport")]
    fn rejects_bad_commands(#[case] line: &str) {
        assert!(Command::parse(line).is_err(), "{line}");
    }

    /// Memory store whose status updates take a while.
    #[derive(Default)]
    struct SlowStore(MemoryRecordStore);

    impl RecordStore for SlowStore {
        fn insert(&self, record: &Record) -> Result<RecordId, StoreError> {
            self.0.insert(record)
        }

        fn update_status(&self, id: RecordId, status: RecordStatus, rendered: Option<&str>) -> Result<(), StoreError> {
            std::thread::sleep(Duration::from_millis(300));
            self.0.update_status(id, status, rendered)
        }

        fn fetch_by_status(&self, status: RecordStatus) -> Result<Vec<Record>, StoreError> {
            self.0.fetch_by_status(status)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn slow_command_does_not_hold_the_runtime() {
        let coordinator = Arc::new(Coordinator::new(
            PipelineSettings::default(),
            None,
            Arc::new(SlowStore::default()),
            Arc::new(TracingDiagnostics),
        ));
        coordinator.handle_packet(InboundPacket {
            payload: r#"<event uid="A1" time="T1"><point lat="1" lon="2" hae="3"/></event>"#.to_string(),
            source: "10.1.1.1:6000".parse().unwrap(),
            received_at: "2024-01-01T00:00:00Z".parse().unwrap(),
        });

        let command = dispatch(&coordinator, Command::Retransform);
        tokio::pin!(command);
        tokio::select! {
            biased;
            _ = &mut command => panic!("command ran on the runtime thread"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        command.await;
        assert!(coordinator.last_rendered().unwrap().starts_with("<simdis>"));
    }

    #[test]
    fn template_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.tpl");
        let bad = dir.path().join("bad.tpl");
        std::fs::write(&good, "<pos id='{uid}'/>").unwrap();
        std::fs::write(&bad, "{speed}").unwrap();

        assert_eq!(load_template(&good).unwrap(), OutputFormat::CustomTemplate("<pos id='{uid}'/>".into()));
        assert!(load_template(&bad).is_err());
    }
}
