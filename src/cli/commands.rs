use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tracing::info;

use crate::config::{Config, DemoConfig};
use crate::lifecycle::{LifecycleHost, ScreenEvent};
use crate::normalizer::NormalizeExt;
use crate::scope::{LiveScope, Scope};

// Lets the lifecycle watchers react before the demo reports on them
const SETTLE: Duration = Duration::from_millis(10);

/// Items arrive in bursts of `burst`, `burst_gap` apart.
fn burst_feed(demo: &DemoConfig) -> impl Stream<Item = anyhow::Result<usize>> + Send + 'static {
    let burst = demo.burst.max(1);
    let gap = demo.burst_gap();
    futures::stream::iter(0..demo.items).then(move |i| async move {
        if i > 0 && i % burst == 0 {
            tokio::time::sleep(gap).await;
        }
        Ok(i)
    })
}

pub async fn run_demo(config: &Config) -> anyhow::Result<()> {
    let screen = Arc::new(LifecycleHost::screen());
    for event in [ScreenEvent::Create, ScreenEvent::Start, ScreenEvent::Resume] {
        screen.emit(event)?;
    }
    println!(
        "Screen resumed; window {} ms, {} items in bursts of {}",
        config.normalizer.window_ms, config.demo.items, config.demo.burst
    );

    let started = Instant::now();
    let ticker = LiveScope::start(screen.clone(), ScreenEvent::Resume, move |token| async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await;
        while !token.is_cancelled() {
            interval.tick().await;
            info!("Screen visible for {} ms", started.elapsed().as_millis());
        }
    })?;

    // Bound at Resume, so the feed is dropped when the screen pauses
    let binding = Scope::for_provider(screen.clone())
        .observer::<usize>()
        .on_next(move |item| {
            println!("[{:>6} ms] item {}", started.elapsed().as_millis(), item);
            Ok(())
        })
        .on_error(|err| {
            println!("Feed failed: {:#}", err);
            Ok(())
        })
        .on_complete(|| {
            println!("Feed finished");
            Ok(())
        })
        .create()
        .subscribe(burst_feed(&config.demo).normalize(config.normalizer.window()));

    tokio::time::sleep(config.demo.visible()).await;

    println!("[{:>6} ms] screen paused", started.elapsed().as_millis());
    screen.emit(ScreenEvent::Pause)?;
    tokio::time::sleep(SETTLE).await;
    println!("Feed binding disposed: {}", binding.is_disposed());

    screen.emit(ScreenEvent::Stop)?;
    screen.emit(ScreenEvent::Destroy)?;
    tokio::time::sleep(SETTLE).await;
    println!("Ticker finished: {}", ticker.is_finished());

    Ok(())
}

pub fn show_config(config: &Config) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
