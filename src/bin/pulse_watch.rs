//! Terminal watcher: runs one session for a topic and prints the ticker after every cycle.
//!
//! Usage: `pulse-watch <topic...>` (set `PULSE_TEST_MODE=mock` to run offline).

use std::time::Duration;

use pulse_portal::{views, PulseRuntime, Session, SessionSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    pulse_portal::telemetry::init_tracing();

    let topic = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if topic.trim().is_empty() {
        eprintln!("usage: pulse-watch <topic...>");
        std::process::exit(2);
    }

    let rt = PulseRuntime::load_default()?;
    let session = Session::new(rt.client.clone(), SessionSettings::from(&rt.cfg.feed));

    println!(
        "watching \"{topic}\" via {} · refresh every {}s",
        rt.client.name(),
        session.settings().poll_interval.as_secs()
    );
    let outcome = session.submit_query(&topic).await?;
    tracing::debug!(?outcome, "first cycle");

    let mut shown = None;
    let mut check = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = check.tick() => {
                let snap = session.snapshot();
                let key = (snap.last_updated, snap.state.error.clone());
                if !snap.state.is_loading && shown.as_ref() != Some(&key) {
                    print_snapshot(&snap);
                    shown = Some(key);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.close();
    println!("pulse-watch done");
    Ok(())
}

fn print_snapshot(snap: &pulse_portal::SessionSnapshot) {
    let at = snap
        .last_updated
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".into());
    println!("── {} · {} items · updated {at}", snap.state.query, snap.state.results.len());
    if let Some(err) = &snap.state.error {
        println!("   ! {err}");
    }
    let entries = views::ticker(&snap.state.results);
    for e in entries.iter().take(snap.state.results.len()) {
        println!("   [{}] {} — {}", e.badge, e.title, e.source);
    }
    let cloud = views::keyword_cloud(&snap.state.results);
    if !cloud.is_empty() {
        let words: Vec<String> = cloud
            .iter()
            .take(8)
            .map(|k| format!("{}×{}", k.word, k.count))
            .collect();
        println!("   # {}", words.join("  "));
    }
}
