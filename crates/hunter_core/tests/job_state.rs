use hunter_core::{JobId, JobState, JobStatus, TransitionError};

#[test]
fn new_job_state_is_running_with_empty_message() {
    let state = JobState::running();
    assert_eq!(state.status, JobStatus::Running);
    assert!(state.message.is_empty());
    assert!(!state.status.is_terminal());
}

#[test]
fn running_moves_to_terminal() {
    let mut state = JobState::running();
    state
        .transition(JobStatus::Done, "Downloaded 3 images")
        .unwrap();
    assert_eq!(state.status, JobStatus::Done);
    assert_eq!(state.message, "Downloaded 3 images");
}

#[test]
fn terminal_state_never_moves_back() {
    let mut state = JobState::running();
    state.transition(JobStatus::Error, "Image source error 500").unwrap();

    let err = state.transition(JobStatus::Running, "").unwrap_err();
    assert_eq!(
        err,
        TransitionError {
            from: JobStatus::Error,
            to: JobStatus::Running
        }
    );
    assert_eq!(state.status, JobStatus::Error);
    assert_eq!(state.message, "Image source error 500");
}

#[test]
fn status_serializes_lowercase() {
    let json = serde_json::to_string(&JobState::running()).unwrap();
    assert_eq!(json, r#"{"status":"running","message":""}"#);
}

#[test]
fn job_ids_are_fresh_and_round_trip_through_text() {
    let a = JobId::new();
    let b = JobId::new();
    assert_ne!(a, b);

    let parsed: JobId = a.to_string().parse().unwrap();
    assert_eq!(parsed, a);
    assert!("not-a-uuid".parse::<JobId>().is_err());
}
