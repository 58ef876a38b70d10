// tests/session_cycle.rs
//
// Fetch/merge cycle behaviour of a single session, driven by a scripted client.

use std::collections::HashSet;
use std::sync::Arc;

use pulse_portal::intel::mock::Scripted;
use pulse_portal::intel::ScriptedClient;
use pulse_portal::session::FETCH_FAILED_MESSAGE;
use pulse_portal::{CycleOutcome, ResultItem, Session, SessionError, SessionSettings};

fn item(id: &str) -> ResultItem {
    ResultItem {
        id: id.into(),
        title: format!("Headline {id}"),
        description: "Two sentences. Of body.".into(),
        source: "Wire".into(),
        published_at: "Just now".into(),
        url: format!("https://example.com/{id}"),
        image_url: None,
        keywords: vec!["pulse".into()],
        location: None,
        fact_check: None,
        is_new: false,
    }
}

fn batch(ids: &[&str]) -> Scripted {
    Scripted::Items(ids.iter().map(|id| item(id)).collect())
}

fn session_with(client: &ScriptedClient) -> Session {
    Session::new(Arc::new(client.clone()), SessionSettings::default())
}

fn ids_and_flags(s: &Session) -> Vec<(String, bool)> {
    s.snapshot()
        .state
        .results
        .into_iter()
        .map(|r| (r.id, r.is_new))
        .collect()
}

async fn wait_until_loading(s: &Session) {
    for _ in 0..1000 {
        if s.snapshot().state.is_loading {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("session never entered Loading");
}

#[tokio::test]
async fn new_items_go_first_and_known_ones_lose_the_flag() {
    let client = ScriptedClient::new([batch(&["1", "2"]), batch(&["3", "1"])]);
    let s = session_with(&client);

    s.submit_query("topic").await.unwrap();
    s.submit_query("topic").await.unwrap();

    assert_eq!(
        ids_and_flags(&s),
        vec![
            ("3".to_string(), true),
            ("1".to_string(), false),
            ("2".to_string(), false)
        ]
    );
}

#[tokio::test]
async fn first_fetch_of_ten_keeps_all_in_order_flagged_new() {
    let ids: Vec<String> = (0..10).map(|i| format!("n{i}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let client = ScriptedClient::new([batch(&refs)]);
    let s = session_with(&client);

    let out = s.submit_query("ten").await.unwrap();
    match out {
        CycleOutcome::Merged(stats) => assert_eq!(stats.added, 10),
        other => panic!("unexpected outcome {other:?}"),
    }

    let snap = s.snapshot();
    assert_eq!(snap.ids(), refs);
    assert!(snap.state.results.iter().all(|r| r.is_new));
    assert!(snap.live);
    assert!(snap.last_updated.is_some());
    assert!(!snap.state.is_loading);
}

#[tokio::test]
async fn merge_properties_hold_across_many_cycles() {
    // Sliding windows of 10 ids, stepping by 4: constant overlap with what is held.
    let script: Vec<Scripted> = (0..8)
        .map(|k| {
            Scripted::Items(
                (k * 4..k * 4 + 10)
                    .map(|n| item(&format!("id{n}")))
                    .collect(),
            )
        })
        .collect();
    let client = ScriptedClient::new(script);
    let s = session_with(&client);

    for _ in 0..8 {
        let before: Vec<String> = s.snapshot().ids().iter().map(|x| x.to_string()).collect();
        let before_set: HashSet<&str> = before.iter().map(String::as_str).collect();

        s.submit_query("sliding").await.unwrap();
        let snap = s.snapshot();
        let results = &snap.state.results;

        assert!(results.len() <= 24, "len {}", results.len());
        let unique: HashSet<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(unique.len(), results.len(), "duplicate ids");

        for r in results {
            assert_eq!(r.is_new, !before_set.contains(r.id.as_str()), "flag of {}", r.id);
        }

        let first_old = results.iter().position(|r| !r.is_new).unwrap_or(results.len());
        assert!(results[first_old..].iter().all(|r| !r.is_new), "new after old");

        // held items keep their prior relative order
        let old_now: Vec<&str> = results[first_old..].iter().map(|r| r.id.as_str()).collect();
        let old_before: Vec<&str> = before
            .iter()
            .map(String::as_str)
            .filter(|id| old_now.contains(id))
            .collect();
        assert_eq!(old_now, old_before);
    }
}

#[tokio::test]
async fn below_capacity_nothing_is_dropped() {
    let client = ScriptedClient::new([batch(&["a", "b", "c"]), batch(&["d", "e"])]);
    let s = session_with(&client);
    s.submit_query("q").await.unwrap();
    s.submit_query("q").await.unwrap();
    assert_eq!(s.snapshot().ids(), vec!["d", "e", "a", "b", "c"]);
}

#[tokio::test]
async fn failed_fetch_keeps_results_and_sets_error() {
    let client = ScriptedClient::new([batch(&["1", "2"]), Scripted::Fail(503), batch(&["3"])]);
    let s = session_with(&client);

    s.submit_query("q").await.unwrap();
    let before = s.snapshot();

    let out = s.submit_query("q").await.unwrap();
    assert!(matches!(out, CycleOutcome::Failed(_)));
    let after = s.snapshot();
    assert_eq!(after.ids(), before.ids());
    assert_eq!(after.state.error.as_deref(), Some(FETCH_FAILED_MESSAGE));
    assert!(!after.state.is_loading);
    assert_eq!(after.last_updated, before.last_updated);

    // the next attempt clears the error
    s.refresh().await.unwrap();
    let healed = s.snapshot();
    assert!(healed.state.error.is_none());
    assert_eq!(healed.ids(), vec!["3", "1", "2"]);
}

#[tokio::test]
async fn blank_query_and_empty_refresh_are_refused() {
    let client = ScriptedClient::default();
    let s = session_with(&client);

    assert_eq!(s.submit_query("   ").await, Err(SessionError::EmptyQuery));
    assert_eq!(s.refresh().await, Err(SessionError::NoQuery));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn query_is_stored_trimmed_and_reused_by_refresh() {
    let client = ScriptedClient::default();
    let s = session_with(&client);
    s.submit_query("  Kerala floods ").await.unwrap();
    s.refresh().await.unwrap();
    assert_eq!(s.snapshot().state.query, "Kerala floods");
    assert_eq!(client.queries(), vec!["Kerala floods", "Kerala floods"]);
}

#[tokio::test]
async fn second_submit_while_loading_is_busy() {
    let client = ScriptedClient::gated([batch(&["1"])]);
    let s = Arc::new(session_with(&client));

    let first = {
        let s = s.clone();
        tokio::spawn(async move { s.submit_query("first").await })
    };
    wait_until_loading(&s).await;

    assert_eq!(s.submit_query("second").await, Err(SessionError::Busy));
    assert_eq!(s.refresh().await, Err(SessionError::Busy));
    assert_eq!(client.calls(), 1);

    client.release(1);
    let out = first.await.unwrap().unwrap();
    assert!(matches!(out, CycleOutcome::Merged(_)));
    assert_eq!(s.snapshot().state.query, "first");
}

#[tokio::test]
async fn fetch_finishing_after_teardown_changes_nothing() {
    let client = ScriptedClient::gated([batch(&["late"])]);
    let s = Arc::new(session_with(&client));

    let pending = {
        let s = s.clone();
        tokio::spawn(async move { s.submit_query("q").await })
    };
    wait_until_loading(&s).await;

    s.close();
    client.release(1);
    assert_eq!(pending.await.unwrap(), Err(SessionError::Closed));
    assert!(s.snapshot().state.results.is_empty());
    assert_eq!(s.submit_query("again").await, Err(SessionError::Closed));
}
