use std::time::Duration;

use chainlab_core::{
    codec::HeaderTemplate,
    constants::ZERO_HASH_HEX,
    input::LineInput,
    pow,
    session::{
        MiningAttemptRecord, NonceTarget, SessionConfig, SessionEvent, SessionOutcome,
        TimeboxedSession,
    },
    BlockHeader,
};
use tokio::time::Instant;

const GENESIS_NONCE: u32 = 2_083_236_893;

fn genesis_header() -> BlockHeader {
    BlockHeader {
        name: "Block #0".to_string(),
        height: Some(0),
        version: 1,
        prev_block: ZERO_HASH_HEX.to_string(),
        merkle_root: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b".to_string(),
        timestamp: 1_231_006_505,
        bits: 0x1d00ffff,
    }
}

fn template() -> HeaderTemplate {
    HeaderTemplate::new(&genesis_header()).unwrap()
}

fn scripted(lines: &[&str]) -> (chainlab_core::input::LineSender, LineInput) {
    let (tx, input) = LineInput::channel();
    for line in lines {
        tx.send(line.to_string()).unwrap();
    }
    (tx, input)
}

#[test]
fn genesis_header_hashes_to_the_known_block_hash() {
    let mut template = template();
    let hash = template.try_nonce(GENESIS_NONCE);
    assert_eq!(
        hash,
        "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
    );
    // display order differs from the raw digest order
    let raw = pow::sha256d(template.as_bytes());
    assert_eq!(pow::display_hash(&raw), hash);
    assert_ne!(hex::encode(raw), hash);
}

#[tokio::test(start_paused = true)]
async fn misses_only_report_attempts_and_no_hits() {
    let misses: Vec<String> = (0u32..)
        .filter(|n| !pow::meets_difficulty(&template().try_nonce(*n), 2))
        .take(3)
        .map(|n| n.to_string())
        .collect();
    let lines: Vec<&str> = misses.iter().map(String::as_str).collect();
    let (_tx, mut input) = scripted(&lines);

    let mut target = template();
    let mut events = Vec::new();
    let started = Instant::now();
    let report = TimeboxedSession::new(SessionConfig::collect(Duration::from_secs(5), 2))
        .run(&mut target, &mut input, &mut events)
        .await;

    assert_eq!(report.outcome, SessionOutcome::TimedOut);
    assert_eq!(report.attempts, 3);
    assert!(report.hits.is_empty());
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(6));
    let miss_count = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Miss { .. }))
        .count();
    assert_eq!(miss_count, 3);
}

#[tokio::test(start_paused = true)]
async fn non_numeric_input_is_a_notice_not_an_attempt() {
    let (_tx, mut input) = scripted(&["abc", "99999999999", "-3"]);
    let mut target = template();
    let mut events = Vec::new();
    let report = TimeboxedSession::new(SessionConfig::collect(Duration::from_secs(2), 1))
        .run(&mut target, &mut input, &mut events)
        .await;

    assert_eq!(report.attempts, 0);
    assert_eq!(report.rejected, 3);
    assert!(events.contains(&SessionEvent::ValidationNotice {
        input: "abc".to_string()
    }));
}

#[tokio::test(start_paused = true)]
async fn resubmitting_a_solved_nonce_is_flagged() {
    // difficulty 0 accepts every nonce
    let (_tx, mut input) = scripted(&["5", "5", "6"]);
    let mut target = template();
    let mut events = Vec::new();
    let report = TimeboxedSession::new(SessionConfig::collect(Duration::from_secs(3), 0))
        .run(&mut target, &mut input, &mut events)
        .await;

    assert_eq!(report.attempts, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(
        report.hits.iter().map(|h| h.nonce).collect::<Vec<_>>(),
        vec![5, 6]
    );
    assert!(events.contains(&SessionEvent::AlreadySolved { nonce: 5 }));
}

#[tokio::test(start_paused = true)]
async fn first_hit_mode_stops_on_a_valid_nonce() {
    let genesis = GENESIS_NONCE.to_string();
    let (_tx, mut input) = scripted(&["1", &genesis, "2"]);
    let mut target = template();
    let mut events = Vec::new();
    let started = Instant::now();
    let report = TimeboxedSession::new(SessionConfig::first_hit(Duration::from_secs(30), 8))
        .run(&mut target, &mut input, &mut events)
        .await;

    assert_eq!(report.outcome, SessionOutcome::Succeeded);
    assert_eq!(report.attempts, 2);
    assert_eq!(
        report.hits,
        vec![MiningAttemptRecord {
            nonce: GENESIS_NONCE,
            hash: "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f".to_string()
        }]
    );
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(target.nonce(), GENESIS_NONCE);
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Finished {
            outcome: SessionOutcome::Succeeded
        })
    );
}

#[tokio::test(start_paused = true)]
async fn collect_mode_runs_to_the_deadline_after_a_hit() {
    let genesis = GENESIS_NONCE.to_string();
    let (_tx, mut input) = scripted(&[&genesis]);
    let mut target = template();
    let started = Instant::now();
    let report = TimeboxedSession::new(SessionConfig::collect(Duration::from_secs(4), 8))
        .run(&mut target, &mut input, &mut ())
        .await;

    assert_eq!(report.outcome, SessionOutcome::TimedOut);
    assert_eq!(report.hits.len(), 1);
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn cancel_keyword_ends_the_session() {
    let (_tx, mut input) = scripted(&["12", "Quit", "13"]);
    let mut target = template();
    let report = TimeboxedSession::new(SessionConfig::collect(Duration::from_secs(30), 1))
        .run(&mut target, &mut input, &mut ())
        .await;

    assert_eq!(report.outcome, SessionOutcome::Cancelled);
    assert_eq!(report.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn countdown_alerts_cover_the_last_five_seconds() {
    let (_tx, mut input) = scripted(&[]);
    let mut target = template();
    let mut events = Vec::new();
    TimeboxedSession::new(SessionConfig::first_hit(Duration::from_secs(8), 1))
        .run(&mut target, &mut input, &mut events)
        .await;

    let ticks: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Countdown { remaining_secs } => Some(*remaining_secs),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, vec![5, 4, 3, 2, 1]);
    assert_eq!(
        events.first(),
        Some(&SessionEvent::Started {
            duration: Duration::from_secs(8),
            block: None,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn late_lines_are_not_carried_into_the_next_session() {
    let (tx, mut input) = scripted(&[]);
    let mut target = template();
    let first = TimeboxedSession::new(SessionConfig::collect(Duration::from_secs(1), 0))
        .run(&mut target, &mut input, &mut ())
        .await;
    assert_eq!(first.outcome, SessionOutcome::TimedOut);
    // stopped: polls return at once without waiting for a line
    let polled = Instant::now();
    assert_eq!(input.next_line(Duration::from_secs(5)).await, None);
    assert_eq!(polled.elapsed(), Duration::ZERO);

    // typed after the deadline: belongs to the finished session
    tx.send("77".to_string()).unwrap();

    let second = TimeboxedSession::new(SessionConfig::collect(Duration::from_secs(1), 0))
        .run(&mut target, &mut input, &mut ())
        .await;
    assert_eq!(second.attempts, 0);
    assert!(second.hits.is_empty());
}

#[tokio::test(start_paused = true)]
async fn closed_input_still_honours_the_deadline() {
    let (tx, mut input) = scripted(&["3"]);
    drop(tx);
    let mut target = template();
    let started = Instant::now();
    let report = TimeboxedSession::new(SessionConfig::first_hit(Duration::from_secs(3), 60))
        .run(&mut target, &mut input, &mut ())
        .await;
    assert_eq!(report.outcome, SessionOutcome::TimedOut);
    assert_eq!(report.attempts, 1);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
}
