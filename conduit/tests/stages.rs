mod common;

use common::*;
use conduit::{
    Assembly, CacheOptions, Capsule, MemorySink, Phase, ResponseCache, StageFault, Validator,
};
use std::sync::Arc;

fn greeting_cache() -> ResponseCache<GetGreeting> {
    ResponseCache::new("cache", &CacheOptions::default()).unwrap()
}

#[tokio::test]
async fn test_cache_miss_runs_full_journey_and_translates() {
    let events = events();
    let assembly = Assembly::builder("greetings")
        .layer(greeting_cache())
        .layer(Translate)
        .layer(Fixed::<GetGreeting>::new("greeter", "hello".to_string(), &events))
        .build()
        .unwrap();

    let mut capsule = Capsule::<GetGreeting>::new("en".to_string());
    assembly.send(&mut capsule).await.unwrap();

    assert_eq!(capsule.response().map(String::as_str), Some("bonjour"));
    let records = capsule.records();
    assert_eq!(records.len(), 5);
    assert_eq!(
        stage_names(&records),
        vec!["cache", "translate", "greeter", "translate", "cache"]
    );
    assert_eq!(records[0].messages(), &["cache miss".to_string()]);
    assert_eq!(records[3].messages(), &["translated to french".to_string()]);
    assert_eq!(records[4].messages(), &["stored".to_string()]);
}

#[tokio::test]
async fn test_cache_hit_short_circuits_inner_stages_and_terminal() {
    let events = events();
    let sink = Arc::new(MemorySink::new());
    let assembly = Assembly::builder("greetings")
        .layer(Recording::new("outer", &events))
        .layer(greeting_cache())
        .layer(Recording::new("inner", &events))
        .layer(Translate)
        .layer(Fixed::<GetGreeting>::new("greeter", "hello".to_string(), &events))
        .sink(sink.clone())
        .build()
        .unwrap();

    let mut first = Capsule::<GetGreeting>::new("en".to_string());
    assembly.send(&mut first).await.unwrap();
    events.lock().clear();

    let mut second = Capsule::<GetGreeting>::new("en".to_string());
    assembly.send(&mut second).await.unwrap();

    assert_eq!(second.response().map(String::as_str), Some("bonjour"));
    assert_eq!(*events.lock(), vec!["outer:descend", "outer:ascend"]);
    assert_eq!(
        stage_names(&second.records()),
        vec!["outer", "cache", "outer"]
    );
    assert_eq!(second.records()[1].messages(), &["cache hit".to_string()]);

    let metrics = assembly.metrics();
    assert_eq!(metrics.short_circuits_total(), 1);
    assert_eq!(metrics.journeys_completed_total(), 2);
    assert_eq!(sink.export_count(), 2);
}

#[tokio::test]
async fn test_invalidated_entry_reaches_terminal_again() {
    let events = events();
    let cache = Arc::new(greeting_cache());
    let assembly = Assembly::builder("greetings")
        .shared_layer(cache.clone())
        .layer(Fixed::<GetGreeting>::new("greeter", "hello".to_string(), &events))
        .build()
        .unwrap();

    for _ in 0..2 {
        assembly
            .dispatch::<GetGreeting>(Default::default(), "en".to_string())
            .await
            .unwrap();
    }
    assert_eq!(events.lock().len(), 1);

    cache.invalidate(&"en".to_string()).await;
    assembly
        .dispatch::<GetGreeting>(Default::default(), "en".to_string())
        .await
        .unwrap();
    assert_eq!(events.lock().len(), 2);
}

#[test]
fn test_cache_rejects_invalid_options() {
    let options = CacheOptions {
        max_capacity: 0,
        ..CacheOptions::default()
    };
    assert!(ResponseCache::<GetGreeting>::new("cache", &options).is_err());
}

#[tokio::test]
async fn test_validator_rejects_bad_request_before_terminal() {
    let events = events();
    let assembly = Assembly::builder("pricing")
        .layer(Validator::<GetPrice>::new("sku-check", |sku: &String| {
            if sku.is_empty() {
                Err("sku must not be empty".to_string())
            } else {
                Ok(())
            }
        }))
        .layer(Fixed::<GetPrice>::new("store", 5, &events))
        .build()
        .unwrap();

    let err = assembly
        .dispatch::<GetPrice>(Default::default(), String::new())
        .await
        .unwrap_err();
    assert_eq!(err.phase(), Phase::Descend);
    assert!(matches!(err.cause(), StageFault::Validation(_)));
    assert_eq!(
        err.cause().to_string(),
        "validation failed: sku must not be empty"
    );
    assert!(events.lock().is_empty());

    let price = assembly
        .dispatch::<GetPrice>(Default::default(), "widget".to_string())
        .await
        .unwrap();
    assert_eq!(price, 5);
}

#[tokio::test]
async fn test_validator_only_joins_its_own_shape() {
    let events = events();
    let assembly = Assembly::builder("mixed")
        .layer(Validator::<GetPrice>::new("sku-check", |_: &String| Ok(())))
        .layer(Fixed::<GetPrice>::new("store", 5, &events))
        .build()
        .unwrap();

    let conduit = assembly.conduit::<GetPrice>().unwrap();
    assert_eq!(conduit.stage_names(), vec!["sku-check"]);
}
