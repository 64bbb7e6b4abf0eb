use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::button::{Button, RenderGate};
use crate::config::Config;
use crate::day::Agenda;
use crate::demo::build_demo_events;
use crate::display::{Display, save_png_atomic};
use crate::event::RawEvent;
use crate::feed;
use crate::normalize::ingest;
use crate::render::{PagePlan, render_page};
use crate::report::write_layout;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassOptions {
    /// Use the built-in sample agenda instead of the configured calendars.
    pub demo: bool,
    pub print_layout: bool,
}

pub fn local_now(tz: &Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(tz)
}

async fn gather_events(cfg: &Config, opts: PassOptions, now: DateTime<Tz>) -> Vec<RawEvent> {
    if opts.demo {
        info!("using demo events");
        return build_demo_events(now, &cfg.timezone);
    }
    if cfg.calendars.is_empty() {
        warn!("no calendars configured; the page will be empty");
    }
    feed::fetch_all(&cfg.calendars, cfg.request_timeout).await
}

/// One full fetch, layout, draw and push.
#[instrument(skip_all, fields(panel = panel.name(), demo = opts.demo))]
pub async fn render_once(
    cfg: &Config,
    panel: &mut dyn Display,
    opts: PassOptions,
) -> anyhow::Result<PagePlan> {
    let now = local_now(&cfg.timezone);
    let raws = gather_events(cfg, opts, now).await;
    let intervals = ingest(raws, &cfg.timezone);
    let agenda = Agenda::split(&intervals, now.date_naive(), &cfg.timezone);

    let (plan, canvas) = render_page(&agenda, cfg, now);

    save_png_atomic(&cfg.cache_path, canvas.image()).with_context(|| {
        format!("failed to write render cache {}", cfg.cache_path.display())
    })?;
    debug!(cache = %cfg.cache_path.display(), "cached render");

    panel
        .set_image(canvas.image())
        .with_context(|| format!("failed to stage frame on {} display", panel.name()))?;
    panel
        .show()
        .with_context(|| format!("failed to refresh {} display", panel.name()))?;

    if opts.print_layout {
        write_layout(&plan, io::stdout().lock())?;
    }

    info!(
        today = agenda.today.timed.len() + agenda.today.all_day.len(),
        tomorrow = agenda.tomorrow.timed.len() + agenda.tomorrow.all_day.len(),
        "render pass complete"
    );
    Ok(plan)
}

struct Session {
    config: Config,
    display: Mutex<Box<dyn Display>>,
    options: PassOptions,
}

impl Session {
    async fn render(&self) -> anyhow::Result<()> {
        let mut display = self.display.lock().await;
        render_once(&self.config, display.as_mut(), self.options).await?;
        Ok(())
    }
}

/// Polls `button` every `poll_interval` until `shutdown` resolves, spawning
/// `render()` for each admitted press. A press that arrives while a spawned
/// render still holds the gate is dropped, not queued.
///
/// Returns once `shutdown` fired and the last in-flight render finished.
pub async fn poll_presses<S, F, Fut>(
    button: &mut dyn Button,
    poll_interval: Duration,
    shutdown: S,
    mut render: F,
) where
    S: Future<Output = ()>,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let gate = RenderGate::new();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutting down");
                break;
            }
            _ = ticker.tick() => {
                if !button.is_pressed() {
                    continue;
                }
                let Some(permit) = gate.try_acquire() else {
                    debug!("press ignored; render in flight");
                    continue;
                };

                let job = render();
                tokio::spawn(async move {
                    let _permit = permit;
                    job.await;
                });
            }
        }
    }

    gate.drained().await;
}

/// Renders once, then re-renders on every button press until Ctrl-C.
#[instrument(skip_all, fields(button = button.name()))]
pub async fn watch(
    cfg: Config,
    display: Box<dyn Display>,
    mut button: Box<dyn Button>,
    opts: PassOptions,
) -> anyhow::Result<()> {
    let poll_interval = cfg.button.poll_interval;
    let session = Arc::new(Session {
        config: cfg,
        display: Mutex::new(display),
        options: opts,
    });

    if let Err(err) = session.render().await {
        error!(error = format!("{err:#}"), "initial render failed");
    }

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed listening for ctrl-c");
        }
    };

    info!(poll_ms = poll_interval.as_millis() as u64, "watching for refresh requests");
    poll_presses(button.as_mut(), poll_interval, shutdown, || {
        let session = Arc::clone(&session);
        async move {
            if let Err(err) = session.render().await {
                error!(error = format!("{err:#}"), "render after button press failed");
            }
        }
    })
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{PassOptions, poll_presses, render_once};
    use crate::button::Button;
    use crate::config::Config;
    use crate::display::HeadlessDisplay;

    /// Reports one scripted answer per poll, then stays released.
    struct ScriptedButton {
        presses: VecDeque<bool>,
    }

    impl ScriptedButton {
        fn new(presses: &[bool]) -> Self {
            Self {
                presses: presses.iter().copied().collect(),
            }
        }
    }

    impl Button for ScriptedButton {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_pressed(&mut self) -> bool {
            self.presses.pop_front().unwrap_or(false)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn presses_during_a_render_are_dropped() {
        // polls at 0, 250, 500, 750, 1000, 1250, 1500 ms; a render takes 1 s
        let mut button = ScriptedButton::new(&[true, true, true, false, false, false, true]);
        let started = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let render = {
            let started = Arc::clone(&started);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            move || {
                let started = Arc::clone(&started);
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    let now_running = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now_running, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            }
        };

        poll_presses(
            &mut button,
            Duration::from_millis(250),
            tokio::time::sleep(Duration::from_secs(3)),
            render,
        )
        .await;

        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_the_render_in_flight() {
        let mut button = ScriptedButton::new(&[true]);
        let finished = Arc::new(AtomicUsize::new(0));
        let render = {
            let finished = Arc::clone(&finished);
            move || {
                let finished = Arc::clone(&finished);
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                }
            }
        };

        poll_presses(
            &mut button,
            Duration::from_millis(250),
            tokio::time::sleep(Duration::from_secs(1)),
            render,
        )
        .await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn demo_pass_writes_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = dir.path().join("last.png");
        let cfg = Config::from_toml_str(
            &format!(
                "render_width = 400\nrender_height = 300\ncache_path = {:?}\n",
                cache.display().to_string()
            ),
            None,
        )
        .expect("config");

        let mut display = HeadlessDisplay::new(400, 300);
        let plan = render_once(
            &cfg,
            &mut display,
            PassOptions {
                demo: true,
                print_layout: false,
            },
        )
        .await
        .expect("render pass");

        assert_eq!(plan.days.len(), 2);
        let cached = image::open(&cache).expect("cache png");
        assert_eq!(cached.width(), 400);
    }
}
