use std::sync::Arc;

use groundwork::context::FoundationContext;
use groundwork::fields;
use groundwork::hub::{global, CommandHandler};
use groundwork::panic_hook::PanicHook;

fn demo_logging() {
  let log = global().get_logger("demo");
  log.info("service starting");

  let request_log = log.bind(fields! { "request_id" => "req-1234" });
  request_log.info_with(
    "request handled",
    fields! { "http.status_class" => "2xx", "http.method" => "GET", "duration_ms" => 12 },
  );

  request_log.warning_with(
    "credentials sanitized",
    fields! { "password" => "hunter2", "user" => "ana" },
  );

  let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "upstream down");
  request_log.exception("request failed", &err);
}

fn main() {
  PanicHook::install();

  let context = FoundationContext::builder()
    .service_name("groundwork-demo")
    .build()
    .expect("configuration is valid");
  global()
    .initialize(Some(context), false)
    .expect("hub initializes");

  let hello: CommandHandler = Arc::new(|args: &[String]| {
    let log = global().get_logger("demo.hello");
    log.info_with("hello command invoked", fields! { "args" => args.len() as i64 });
    println!("hello from groundwork (args: {:?})", args);
    Ok(())
  });
  global()
    .register_command("hello", hello, Some("demo"))
    .expect("command registers");

  let emit: CommandHandler = Arc::new(|_args: &[String]| {
    demo_logging();
    Ok(())
  });
  global()
    .register_command("log.emit", emit, Some("demo"))
    .expect("command registers");

  let args: Vec<String> = std::env::args().collect();
  let cli = global().build_cli("groundwork-demo", env!("CARGO_PKG_VERSION"));
  let code = if args.len() > 1 {
    cli.run(args)
  } else {
    // No subcommand given: run the logging tour directly.
    demo_logging();
    let snapshot = groundwork::diag::global().snapshot();
    println!("events emitted: {}", snapshot.events_emitted);
    0
  };

  global().shutdown();
  std::process::exit(code);
}
