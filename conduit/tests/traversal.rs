mod common;

use common::*;
use conduit::{
    Assembly, AssemblyOptions, Capabilities, Capsule, Direction, Envelope, GenericStage,
    JourneyStatus, Layer, MemorySink, Phase, RecordKind, StageFault, StageResult, TraceRecord,
    TraceSink, async_trait, error_chain,
};
use std::sync::Arc;
use std::time::Duration;

fn three_stage_assembly(events: &Events, sink: &Arc<MemorySink>) -> Assembly {
    Assembly::builder("pricing")
        .layer(Recording::new("s1", events))
        .layer(Recording::new("s2", events))
        .layer(Recording::new("s3", events))
        .layer(Fixed::<GetPrice>::new("store", 42, events))
        .sink(sink.clone())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_ascend_order_reverses_descend_order() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let conduit = three_stage_assembly(&events, &sink)
        .conduit::<GetPrice>()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    conduit.send(&mut capsule).await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            "s1:descend",
            "s2:descend",
            "s3:descend",
            "store:produce",
            "s3:ascend",
            "s2:ascend",
            "s1:ascend",
        ]
    );
    assert_eq!(capsule.response(), Some(&42));
    assert_eq!(capsule.status(), JourneyStatus::Complete);
    assert!(capsule.fault().is_none());
    assert!(capsule.completed_at().is_some());
    assert!(capsule.duration().is_some());
}

#[tokio::test]
async fn test_successful_journey_writes_two_records_per_stage_plus_terminal() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let conduit = three_stage_assembly(&events, &sink)
        .conduit::<GetPrice>()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    conduit.send(&mut capsule).await.unwrap();

    let records = capsule.records();
    assert_eq!(records.len(), 7);
    assert_eq!(
        stage_names(&records),
        vec!["s1", "s2", "s3", "store", "s3", "s2", "s1"]
    );
    assert!(records[..4].iter().all(|r| r.direction() == Direction::Descending));
    assert!(records[4..].iter().all(|r| r.direction() == Direction::Ascending));
    assert_eq!(records[3].kind(), RecordKind::Terminal);
    assert!(records.iter().all(|r| !r.is_open() && r.fault().is_none()));
    assert!(records.windows(2).all(|w| w[0].started_at() <= w[1].started_at()));
    assert!(records[0].description().starts_with("s1 (get price "));
    assert_eq!(records[0].messages(), &["descend".to_string()]);
}

#[tokio::test]
async fn test_descend_fault_stops_journey() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = Assembly::builder("pricing")
        .layer(Recording::new("s1", &events))
        .layer(Recording::failing("s2", &events, FailAt::Descend))
        .layer(Recording::new("s3", &events))
        .layer(Fixed::<GetPrice>::new("store", 42, &events))
        .sink(sink.clone())
        .build()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    let err = assembly.send(&mut capsule).await.unwrap_err();

    assert_eq!(*events.lock(), vec!["s1:descend", "s2:descend"]);
    assert_eq!(err.phase(), Phase::Descend);
    assert!(err.location().starts_with("s2 "));
    assert!(matches!(err.cause(), StageFault::Validation(_)));
    assert_eq!(err.records().len(), 2);

    let records = capsule.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].fault().is_none());
    assert_eq!(
        records[1].fault(),
        Some("validation failed: s2 rejected the request")
    );
    assert_eq!(capsule.status(), JourneyStatus::Aborted);
    assert!(capsule.response().is_none());
    assert_eq!(capsule.fault().unwrap().phase, Phase::Descend);
    assert_eq!(capsule.fault(), Some(err.summary()));
}

#[tokio::test]
async fn test_terminal_fault_skips_every_ascend() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = Assembly::builder("pricing")
        .layer(Recording::new("s1", &events))
        .layer(Recording::new("s2", &events))
        .layer(Fixed::<GetPrice>::failing("store", &events))
        .sink(sink.clone())
        .build()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    let err = assembly.send(&mut capsule).await.unwrap_err();

    assert_eq!(
        *events.lock(),
        vec!["s1:descend", "s2:descend", "store:produce"]
    );
    assert_eq!(err.phase(), Phase::Produce);
    assert!(matches!(err.cause(), StageFault::Terminal(_)));
    assert_eq!(error_chain(err.cause()), "terminal failed: connection refused");
    assert_eq!(capsule.records().len(), 3);
    assert_eq!(capsule.status(), JourneyStatus::Aborted);
}

#[tokio::test]
async fn test_ascend_fault_discards_response_and_skips_outer_ascends() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = Assembly::builder("pricing")
        .layer(Recording::new("s1", &events))
        .layer(Recording::failing("s2", &events, FailAt::Ascend))
        .layer(Fixed::<GetPrice>::new("store", 42, &events))
        .sink(sink.clone())
        .build()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    let err = assembly.send(&mut capsule).await.unwrap_err();

    assert_eq!(
        *events.lock(),
        vec!["s1:descend", "s2:descend", "store:produce", "s2:ascend"]
    );
    assert_eq!(err.phase(), Phase::Ascend);
    assert!(matches!(err.cause(), StageFault::PostProcessing(_)));
    assert!(capsule.response().is_none());
    assert!(capsule.fault().is_some());

    let records = capsule.records();
    assert_eq!(records.len(), 4);
    assert!(records.last().unwrap().fault().is_some());
    assert_eq!(records.iter().filter(|r| r.fault().is_some()).count(), 1);
}

#[tokio::test]
async fn test_terminal_without_response_is_a_terminal_fault() {
    struct Silent;

    #[conduit::async_trait]
    impl conduit::Terminal<GetPrice> for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn produce(
            &self,
            _capsule: &mut Capsule<GetPrice>,
            _record: &mut conduit::TraceRecord,
        ) -> conduit::StageResult {
            Ok(())
        }
    }

    impl conduit::Layer for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn capabilities(self: Arc<Self>, caps: &mut conduit::Capabilities) {
            caps.terminal::<GetPrice>(self);
        }
    }

    let assembly = Assembly::builder("pricing").layer(Silent).build().unwrap();
    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    let err = assembly.send(&mut capsule).await.unwrap_err();

    assert_eq!(err.phase(), Phase::Produce);
    assert!(error_chain(err.cause()).contains("`silent` returned without a response"));
}

#[tokio::test]
async fn test_shape_without_stages_goes_straight_to_terminal() {
    let events = events();
    let assembly = Assembly::builder("pricing")
        .layer(Fixed::<GetPrice>::new("store", 42, &events))
        .build()
        .unwrap();

    let price = assembly
        .dispatch::<GetPrice>(Default::default(), "widget".to_string())
        .await
        .unwrap();

    assert_eq!(price, 42);
    assert_eq!(*events.lock(), vec!["store:produce"]);
}

#[tokio::test]
async fn test_capsule_reaches_terminal_state_once() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let conduit = three_stage_assembly(&events, &sink)
        .conduit::<GetPrice>()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    conduit.send(&mut capsule).await.unwrap();
    assert!(capsule.set_response(7).is_err());

    let err = conduit.send(&mut capsule).await.unwrap_err();
    assert_eq!(err.phase(), Phase::Admission);
    assert_eq!(capsule.status(), JourneyStatus::Complete);
    assert_eq!(capsule.response(), Some(&42));
    assert_eq!(capsule.records().len(), 7);
    assert!(capsule.fault().is_none());
    assert_eq!(sink.export_count(), 1);
}

#[tokio::test]
async fn test_unsupported_shape_aborts_at_resolve() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = three_stage_assembly(&events, &sink);

    let mut capsule = Capsule::<DeleteCustomer>::new(7);
    let err = assembly.send(&mut capsule).await.unwrap_err();

    assert_eq!(err.phase(), Phase::Resolve);
    assert!(matches!(
        err.cause(),
        StageFault::Engine(conduit::ConduitError::Config(_))
    ));
    assert_eq!(capsule.status(), JourneyStatus::Aborted);
    assert!(capsule.records().is_empty());
    assert!(events.lock().is_empty());
    assert_eq!(sink.export_count(), 1);
}

#[tokio::test]
async fn test_root_exported_once_per_journey_on_success_and_fault() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = Assembly::builder("pricing")
        .layer(Recording::new("s1", &events))
        .layer(Fixed::<GetPrice>::failing("store", &events))
        .sink(sink.clone())
        .build()
        .unwrap();

    let mut first = Capsule::<GetPrice>::new("a".to_string());
    let mut second = Capsule::<GetPrice>::new("b".to_string());
    assert!(assembly.send(&mut first).await.is_err());
    assert!(assembly.send(&mut second).await.is_err());

    let exported = sink.journeys();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[0].id(), first.id());
    assert_eq!(exported[1].id(), second.id());
    assert!(exported.iter().all(|j| j.status() == JourneyStatus::Aborted));

    let metrics = assembly.metrics();
    assert_eq!(metrics.journeys_started_total(), 2);
    assert_eq!(metrics.journeys_aborted_total(), 2);
    assert_eq!(metrics.exports_total(), 2);
    assert_eq!(metrics.in_flight(), 0);
}

#[tokio::test]
async fn test_export_can_be_disabled() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = Assembly::builder("pricing")
        .options(AssemblyOptions {
            export_traces: false,
            ..AssemblyOptions::named("pricing")
        })
        .layer(Fixed::<GetPrice>::new("store", 42, &events))
        .sink(sink.clone())
        .build()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    assembly.send(&mut capsule).await.unwrap();
    assert_eq!(sink.export_count(), 0);
}

#[tokio::test]
async fn test_panicking_sink_does_not_reach_caller() {
    struct Exploding;

    impl TraceSink for Exploding {
        fn export(&self, _journey: Arc<conduit::Journey>) {
            panic!("sink is down");
        }

        fn export_fault(&self, _message: &str) {
            panic!("sink is down");
        }
    }

    let events = events();
    let assembly = Assembly::builder("pricing")
        .layer(Fixed::<GetPrice>::new("store", 42, &events))
        .sink(Arc::new(Exploding))
        .build()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    assembly.send(&mut capsule).await.unwrap();
    assembly.report_fault(&conduit::ConduitError::InvalidArgument("bad body".into()));

    assert_eq!(capsule.response(), Some(&42));
    let metrics = assembly.metrics();
    assert_eq!(metrics.sink_failures_total(), 2);
    assert_eq!(metrics.exports_total(), 0);
}

#[tokio::test]
async fn test_concurrent_journeys_share_one_conduit() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let conduit = three_stage_assembly(&events, &sink)
        .conduit::<GetPrice>()
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let conduit = conduit.clone();
            tokio::spawn(async move {
                let mut capsule = Capsule::<GetPrice>::new(format!("sku-{}", i));
                conduit.send(&mut capsule).await.map(|_| capsule)
            })
        })
        .collect();

    for handle in handles {
        let capsule = handle.await.unwrap().unwrap();
        assert_eq!(capsule.records().len(), 7);
        assert_eq!(capsule.response(), Some(&42));
    }
    assert_eq!(sink.export_count(), 8);
}

/// Stage whose descend never finishes.
struct Stalled;

#[async_trait]
impl GenericStage for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn descend(&self, _capsule: &dyn Envelope, record: &mut TraceRecord) -> StageResult {
        record.log("waiting");
        futures::future::pending::<()>().await;
        Ok(())
    }
}

impl Layer for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.every_shape(self);
    }
}

#[tokio::test]
async fn test_dropped_send_leaves_capsule_in_flight() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = Assembly::builder("pricing")
        .layer(Recording::new("s1", &events))
        .layer(Stalled)
        .layer(Fixed::<GetPrice>::new("store", 42, &events))
        .sink(sink.clone())
        .build()
        .unwrap();

    let mut capsule = Capsule::<GetPrice>::new("widget".to_string());
    let sent = tokio::time::timeout(Duration::from_millis(50), assembly.send(&mut capsule)).await;
    assert!(sent.is_err());

    assert_eq!(capsule.status(), JourneyStatus::InFlight);
    assert!(capsule.fault().is_none());
    assert!(!capsule.has_response());

    let records = capsule.records();
    assert_eq!(stage_names(&records), vec!["s1", "stalled"]);
    assert!(!records[0].is_open());
    let last = records.last().unwrap();
    assert!(last.is_open());
    assert!(last.duration().is_none());
    assert_eq!(events.lock().as_slice(), &["s1:descend".to_string()]);

    assert_eq!(sink.export_count(), 0);
    let metrics = assembly.metrics();
    assert_eq!(metrics.journeys_started_total(), 1);
    assert_eq!(metrics.in_flight(), 1);
}
