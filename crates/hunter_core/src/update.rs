use crate::{CandidateItem, CrawlPhase, CrawlState, Effect, JobStatus, Msg};

/// Pure update function: applies a message to the crawl state and returns any effects.
///
/// Messages that do not fit the current phase (a stale page, a batch result
/// after the crawl finished) are ignored.
pub fn update(mut state: CrawlState, msg: Msg) -> (CrawlState, Vec<Effect>) {
    let effects = match (state.phase(), msg) {
        (CrawlPhase::Idle, Msg::Start) => {
            if state.cap_reached() {
                return done(state);
            }
            vec![request_next_page(&mut state)]
        }
        (CrawlPhase::AwaitingPage, Msg::PageLoaded { page, urls }) if page == state.next_page() => {
            if urls.is_empty() {
                return done(state);
            }
            let mut items = Vec::with_capacity(urls.len().min(state.target()));
            for url in urls {
                if state.cap_reached() {
                    break;
                }
                let index = state.take_index();
                items.push(CandidateItem::new(index, url, state.output_dir()));
            }
            state.advance_page();
            state.set_phase(CrawlPhase::AwaitingBatch);
            vec![Effect::FetchBatch { page, items }]
        }
        (CrawlPhase::AwaitingPage, Msg::PageRejected { page, status }) if page == state.next_page() => {
            vec![finish(
                &mut state,
                JobStatus::Error,
                format!("Image source error {status}"),
            )]
        }
        (CrawlPhase::AwaitingPage, Msg::PageFailed { page, reason }) if page == state.next_page() => {
            vec![finish(
                &mut state,
                JobStatus::Error,
                format!("Image source request failed: {reason}"),
            )]
        }
        (CrawlPhase::AwaitingBatch, Msg::BatchFinished { succeeded, failed }) => {
            state.record_batch(succeeded, failed);
            if state.cap_reached() {
                return done(state);
            }
            vec![request_next_page(&mut state)]
        }
        (CrawlPhase::Finished, _) => Vec::new(),
        (_, Msg::Aborted { reason }) => vec![finish(&mut state, JobStatus::Error, reason)],
        _ => Vec::new(),
    };

    (state, effects)
}

fn done(mut state: CrawlState) -> (CrawlState, Vec<Effect>) {
    let message = done_message(&state);
    let effect = finish(&mut state, JobStatus::Done, message);
    (state, vec![effect])
}

fn done_message(state: &CrawlState) -> String {
    format!("Downloaded {} images", state.summary().succeeded)
}

fn request_next_page(state: &mut CrawlState) -> Effect {
    state.set_phase(CrawlPhase::AwaitingPage);
    Effect::RequestPage {
        page: state.next_page(),
        page_size: state.page_size(),
    }
}

fn finish(state: &mut CrawlState, status: JobStatus, message: String) -> Effect {
    state.set_phase(CrawlPhase::Finished);
    Effect::Finish { status, message }
}
