use std::path::{Path, PathBuf};
use std::sync::Once;

use hunter_core::{
    update, CandidateItem, CrawlPhase, CrawlState, Effect, JobStatus, Msg, MAX_ITEMS,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(hunter_logging::initialize_for_tests);
}

fn urls(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| format!("https://img.example.com/{name}"))
        .collect()
}

fn start(target: usize, max_page_size: u32) -> (CrawlState, Vec<Effect>) {
    update(
        CrawlState::new(target, max_page_size, PathBuf::from("out")),
        Msg::Start,
    )
}

fn batch_of(effects: &[Effect]) -> Vec<CandidateItem> {
    match effects {
        [Effect::FetchBatch { items, .. }] => items.clone(),
        other => panic!("expected a single FetchBatch, got {other:?}"),
    }
}

#[test]
fn start_requests_first_page_sized_by_target() {
    init_logging();
    let (state, effects) = start(3, 80);

    assert_eq!(state.phase(), CrawlPhase::AwaitingPage);
    assert_eq!(
        effects,
        vec![Effect::RequestPage {
            page: 1,
            page_size: 3
        }]
    );
}

#[test]
fn page_size_is_capped_by_source_maximum() {
    init_logging();
    let (_state, effects) = start(150, 80);

    assert_eq!(
        effects,
        vec![Effect::RequestPage {
            page: 1,
            page_size: 80
        }]
    );
}

#[test]
fn target_is_clamped_to_max_items() {
    init_logging();
    let state = CrawlState::new(10_000, 500, PathBuf::from("out"));

    assert_eq!(state.target(), MAX_ITEMS);
    assert_eq!(state.page_size(), MAX_ITEMS as u32);
}

#[test]
fn zero_target_finishes_without_requesting() {
    init_logging();
    let (state, effects) = start(0, 80);

    assert!(state.is_finished());
    assert_eq!(
        effects,
        vec![Effect::Finish {
            status: JobStatus::Done,
            message: "Downloaded 0 images".to_string(),
        }]
    );
}

#[test]
fn indices_continue_across_pages_and_stop_mid_page() {
    init_logging();
    let (state, _) = start(3, 2);

    let (state, effects) = update(
        state,
        Msg::PageLoaded {
            page: 1,
            urls: urls(&["a.png", "b"]),
        },
    );
    let first = batch_of(&effects);
    assert_eq!(
        first,
        vec![
            CandidateItem::new(0, "https://img.example.com/a.png", Path::new("out")),
            CandidateItem::new(1, "https://img.example.com/b", Path::new("out")),
        ]
    );
    assert_eq!(first[0].path, PathBuf::from("out").join("000.png"));
    assert_eq!(first[1].path, PathBuf::from("out").join("001.jpg"));

    let (state, effects) = update(
        state,
        Msg::BatchFinished {
            succeeded: 2,
            failed: 0,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::RequestPage {
            page: 2,
            page_size: 2
        }]
    );

    let (state, effects) = update(
        state,
        Msg::PageLoaded {
            page: 2,
            urls: urls(&["c.gif", "d.gif"]),
        },
    );
    let second = batch_of(&effects);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].index, 2);
    assert_eq!(second[0].path, PathBuf::from("out").join("002.gif"));

    let (state, effects) = update(
        state,
        Msg::BatchFinished {
            succeeded: 1,
            failed: 0,
        },
    );
    assert!(state.is_finished());
    assert_eq!(
        effects,
        vec![Effect::Finish {
            status: JobStatus::Done,
            message: "Downloaded 3 images".to_string(),
        }]
    );
    let summary = state.summary();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.scheduled, 3);
}

#[test]
fn one_item_pages_then_empty_yields_three_items() {
    init_logging();
    let (mut state, mut effects) = start(3, 80);
    let mut scheduled = Vec::new();

    for page in 1..=5u32 {
        if state.is_finished() {
            break;
        }
        assert_eq!(
            effects,
            vec![Effect::RequestPage { page, page_size: 3 }]
        );
        let (next, batch) = update(
            state,
            Msg::PageLoaded {
                page,
                urls: urls(&[format!("{page}.jpg").as_str()]),
            },
        );
        scheduled.extend(batch_of(&batch));
        let (next, next_effects) = update(
            next,
            Msg::BatchFinished {
                succeeded: 1,
                failed: 0,
            },
        );
        state = next;
        effects = next_effects;
    }

    assert_eq!(scheduled.len(), 3);
    assert!(state.is_finished());
    assert_eq!(
        effects,
        vec![Effect::Finish {
            status: JobStatus::Done,
            message: "Downloaded 3 images".to_string(),
        }]
    );
}

#[test]
fn empty_page_finishes_done_with_partial_results() {
    init_logging();
    let (state, _) = start(10, 80);
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            page: 1,
            urls: urls(&["a.jpg", "b.jpg"]),
        },
    );
    let (state, _) = update(
        state,
        Msg::BatchFinished {
            succeeded: 1,
            failed: 1,
        },
    );
    let (state, effects) = update(
        state,
        Msg::PageLoaded {
            page: 2,
            urls: Vec::new(),
        },
    );

    assert!(state.is_finished());
    assert_eq!(
        effects,
        vec![Effect::Finish {
            status: JobStatus::Done,
            message: "Downloaded 1 images".to_string(),
        }]
    );
    assert_eq!(state.summary().failed, 1);
}

#[test]
fn rejected_page_finishes_with_status_code() {
    init_logging();
    let (state, _) = start(10, 1);
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            page: 1,
            urls: urls(&["a.jpg"]),
        },
    );
    let (state, _) = update(
        state,
        Msg::BatchFinished {
            succeeded: 1,
            failed: 0,
        },
    );
    let (state, effects) = update(state, Msg::PageRejected { page: 2, status: 429 });

    assert!(state.is_finished());
    match effects.as_slice() {
        [Effect::Finish { status, message }] => {
            assert_eq!(*status, JobStatus::Error);
            assert!(message.contains("429"), "message was {message}");
        }
        other => panic!("unexpected effects {other:?}"),
    }
}

#[test]
fn transport_failure_finishes_with_reason() {
    init_logging();
    let (state, _) = start(4, 80);
    let (state, effects) = update(
        state,
        Msg::PageFailed {
            page: 1,
            reason: "connection refused".to_string(),
        },
    );

    assert!(state.is_finished());
    assert_eq!(
        effects,
        vec![Effect::Finish {
            status: JobStatus::Error,
            message: "Image source request failed: connection refused".to_string(),
        }]
    );
}

#[test]
fn abort_finishes_once() {
    init_logging();
    let (state, _) = start(4, 80);
    let (state, effects) = update(
        state,
        Msg::Aborted {
            reason: "job deadline exceeded".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Finish {
            status: JobStatus::Error,
            message: "job deadline exceeded".to_string(),
        }]
    );

    let (_state, effects) = update(
        state,
        Msg::Aborted {
            reason: "again".to_string(),
        },
    );
    assert!(effects.is_empty());
}
