//! Integration tests for linear pipelines

use async_trait::async_trait;
use pipewright::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn test_basic_pipeline() -> Result<()> {
    let report = Pipeline::source("range", RangeSource::new(0..10))
        .stage("noop", NoOpProcessor::<i64>::new())
        .buffer_size(5)
        .run(CollectSink::new())
        .await?;

    assert_eq!(report.output, (0..10).collect::<Vec<_>>());
    assert_eq!(report.state, PipelineState::Completed);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_with_processing() {
    let report = Pipeline::source("range", RangeSource::new(1..6))
        .stage("double", MapProcessor::new(|x: i64| x * 2))
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![2, 4, 6, 8, 10]);
}

#[tokio::test]
async fn test_filter_processor() {
    let report = Pipeline::source("range", RangeSource::new(1..11))
        .stage("even", FilterProcessor::new(|x: &i64| x % 2 == 0))
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![2, 4, 6, 8, 10]);
    // Filtered items are skipped, not rejected.
    assert!(report.errors.is_empty());
    assert_eq!(report.stats_for("even").unwrap().skipped, 5);
}

#[tokio::test]
async fn test_chained_stages() {
    let report = Pipeline::source("range", RangeSource::new(1..21))
        .stage("even", FilterProcessor::new(|x: &i64| x % 2 == 0))
        .stage("triple", MapProcessor::new(|x: i64| x * 3))
        .stage("small", FilterProcessor::new(|x: &i64| *x <= 18))
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![6, 12, 18]);
    assert_eq!(report.stats.len(), 4);
}

#[tokio::test]
async fn test_combinators() {
    let combined =
        FilterProcessor::new(|x: &i64| x % 2 == 0).then(MapProcessor::new(|x: i64| x * 2));

    let report = Pipeline::source("range", RangeSource::new(1..11))
        .stage("even_doubled", combined)
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![4, 8, 12, 16, 20]);
}

#[tokio::test]
async fn test_error_handling() {
    let processor = TryMapProcessor::new(|x: i32| {
        if x == 3 {
            Err(Rejection::new("three is not allowed").with_item(x.to_string()))
        } else {
            Ok(x * 2)
        }
    });

    let report = Pipeline::source("gen", VecSource::new(vec![1, 2, 3, 4, 5]))
        .stage("double", processor)
        .run(CollectSink::new())
        .await
        .unwrap();

    // A rejected item does not stop the run.
    assert_eq!(report.output, vec![2, 4, 8, 10]);
    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, "double");
    assert_eq!(report.errors[0].message, "three is not allowed");
    assert_eq!(report.errors[0].item.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_source_errors_are_reported_by_the_generator() {
    let entries = vec![Ok("a"), Err("permission denied"), Ok("b")];

    let report = Pipeline::source("walk", TryIterSource::new(entries))
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec!["a", "b"]);
    assert_eq!(report.errors, vec![StageError::new("walk", "permission denied")]);
}

#[tokio::test]
async fn test_errors_from_several_stages() {
    let report = Pipeline::source("gen", RangeSource::new(0..10))
        .stage(
            "no_threes",
            TryMapProcessor::new(|x: i64| if x % 3 == 0 { Err("multiple of 3") } else { Ok(x) }),
        )
        .stage(
            "no_fives",
            TryMapProcessor::new(|x: i64| if x % 5 == 0 { Err("multiple of 5") } else { Ok(x) }),
        )
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![1, 2, 4, 7, 8]);
    assert_eq!(report.errors_from("no_threes").count(), 4);
    assert_eq!(report.errors_from("no_fives").count(), 1);
}

#[tokio::test]
async fn test_item_timeout() {
    let slow = processor_from_fn(|x: u64| async move {
        if x == 1 {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Outcome::Emit(x)
    });

    let report = Pipeline::source("gen", VecSource::new(vec![0_u64, 1, 2]))
        .stage("slow", slow)
        .item_timeout(Duration::from_millis(50))
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![0, 2]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.starts_with("timed out"));
}

#[tokio::test]
async fn test_panicking_transform_rejects_the_item() {
    let report = Pipeline::source("gen", VecSource::new(vec![1, 2, 3]))
        .stage(
            "fragile",
            MapProcessor::new(|x: i32| {
                if x == 2 {
                    panic!("cannot handle two");
                }
                x
            }),
        )
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![1, 3]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("cannot handle two"));
}

struct ExplodingSink;

#[async_trait]
impl Sink for ExplodingSink {
    type Item = i64;
    type Output = ();

    async fn write(&mut self, item: Self::Item) {
        if item == 3 {
            panic!("sink exploded");
        }
    }

    async fn finish(self) -> Self::Output {}
}

#[tokio::test]
async fn test_sink_panic_fails_the_run() {
    let running = Pipeline::source("range", RangeSource::new(0..1_000))
        .buffer_size(2)
        .spawn(ExplodingSink)
        .unwrap();
    let state = running.subscribe_state();

    let err = running.join().await.unwrap_err();
    match err {
        Error::Panicked { stage, message } => {
            assert_eq!(stage, "sink");
            assert_eq!(message, "sink exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*state.borrow(), PipelineState::Failed);
}

#[tokio::test]
async fn test_count_sink() {
    let report = Pipeline::source("range", RangeSource::new(1..11))
        .run(CountSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, 10);
}

#[tokio::test]
async fn test_fold_sink() {
    let report = Pipeline::source("range", RangeSource::new(1..5))
        .run(FoldSink::new(0, |acc: i64, x: i64| acc + x))
        .await
        .unwrap();

    assert_eq!(report.output, 10);
}

#[tokio::test]
async fn test_vec_source() {
    let items = vec!["a", "b", "c", "d"];

    let report = Pipeline::source("vec", VecSource::new(items.clone()))
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, items);
}

#[tokio::test]
async fn test_empty_source() {
    let report = Pipeline::source("empty", VecSource::<i32>::new(vec![]))
        .stage("noop", NoOpProcessor::new())
        .run(CollectSink::new())
        .await
        .unwrap();

    assert!(report.output.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(report.state, PipelineState::Completed);
}

#[tokio::test]
async fn test_stream_source() {
    let stream = futures::stream::iter(vec![3, 1, 2]);

    let report = Pipeline::source("stream", StreamSource::new(stream))
        .stage("inc", MapProcessor::new(|x: i32| x + 1))
        .run(CollectSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, vec![4, 2, 3]);
}

#[tokio::test]
async fn test_from_channel() {
    let (tx, rx) = pipewright::core::channel(Capacity::Bounded(2)).unwrap();
    let token = tokio_util::sync::CancellationToken::new();

    let running = Pipeline::from_channel(rx)
        .stage("square", MapProcessor::new(|x: u32| x * x))
        .spawn(CollectSink::new())
        .unwrap();

    for i in 1..=4 {
        let _ = tx.send(i, &token).await;
    }
    tx.close();

    let report = running.join().await.unwrap();
    assert_eq!(report.output, vec![1, 4, 9, 16]);
}

#[tokio::test]
async fn test_function_helpers() {
    let mut next = 0;
    let source = source_from_fn(move || {
        next += 1;
        let item = if next <= 3 { Some(Ok(next)) } else { None };
        async move { item }
    });

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink = sink_from_fn(move |x: i32| {
        sink_seen.lock().unwrap().push(x);
        async {}
    });

    Pipeline::source("fn", source).run(sink).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_unbounded_pipeline() {
    let report = Pipeline::source("range", RangeSource::new(0..500))
        .stage("noop", NoOpProcessor::new())
        .unbounded()
        .run(CountSink::new())
        .await
        .unwrap();

    assert_eq!(report.output, 500);
}
