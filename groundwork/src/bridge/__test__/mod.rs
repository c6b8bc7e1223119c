#[cfg(test)]
mod __test__ {

  use tracing_subscriber::layer::SubscriberExt;

  use crate::bridge::{level_from_tracing, TracingBridge};
  use crate::context::FoundationContext;
  use crate::event::Level;
  use crate::hub::global;

  #[test]
  fn test_level_mapping() {
    assert_eq!(level_from_tracing(&tracing::Level::TRACE), Level::Trace);
    assert_eq!(level_from_tracing(&tracing::Level::DEBUG), Level::Debug);
    assert_eq!(level_from_tracing(&tracing::Level::INFO), Level::Info);
    assert_eq!(level_from_tracing(&tracing::Level::WARN), Level::Warning);
    assert_eq!(level_from_tracing(&tracing::Level::ERROR), Level::Error);
  }

  #[test]
  fn test_bridge_forwards_events_into_pipeline() {
    let _guard = crate::test_support::hub_guard();
    global().reset_for_testing();
    let mut ctx = FoundationContext::default();
    ctx.telemetry_disabled = true;
    global().initialize(Some(ctx), false).unwrap();

    let before = crate::diag::global().snapshot().events_emitted;

    let subscriber = tracing_subscriber::registry().with(TracingBridge::new());
    tracing::subscriber::with_default(subscriber, || {
      tracing::info!(user = "ana", attempt = 3, "bridged event");
    });

    let after = crate::diag::global().snapshot().events_emitted;
    assert!(after > before, "bridged event did not reach the pipeline");

    global().reset_for_testing();
  }

  #[test]
  fn test_bridge_respects_effective_level() {
    let _guard = crate::test_support::hub_guard();
    global().reset_for_testing();
    let mut ctx = FoundationContext::default();
    ctx.telemetry_disabled = true;
    ctx.default_level = Level::Error;
    global().initialize(Some(ctx), false).unwrap();

    let before = crate::diag::global().snapshot();

    let subscriber = tracing_subscriber::registry().with(TracingBridge::new());
    tracing::subscriber::with_default(subscriber, || {
      tracing::debug!("suppressed");
    });

    let after = crate::diag::global().snapshot();
    assert_eq!(after.events_emitted, before.events_emitted);
    assert!(after.dropped_by_level > before.dropped_by_level);

    global().reset_for_testing();
  }
}
