use chrono::{NaiveDate, TimeZone};
use dayboard_core::canvas::Canvas;
use dayboard_core::color::Color;
use dayboard_core::config::Config;
use dayboard_core::day::Agenda;
use dayboard_core::demo::build_demo_events;
use dayboard_core::display::{Display, PngDisplay, save_png_atomic};
use dayboard_core::normalize::ingest;
use dayboard_core::render::{Theme, draw_page, plan_page, render_page};
use tempfile::tempdir;

fn demo_config() -> Config {
    Config::from_toml_str(
        r##"
timezone = "America/Chicago"
background_color = "white"
text_color = "#000"
render_width = 1600
render_height = 1200
"##,
        None,
    )
    .expect("config")
}

#[test]
fn demo_agenda_renders_to_png_panel() {
    let cfg = demo_config();
    let tz = cfg.timezone;
    let now = tz
        .with_ymd_and_hms(2026, 2, 17, 7, 15, 0)
        .single()
        .expect("valid time");
    let intervals = ingest(build_demo_events(now, &tz), &tz);
    let today = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
    let agenda = Agenda::split(&intervals, today, &tz);

    let (plan, canvas) = render_page(&agenda, &cfg, now);
    assert_eq!(plan.days[0].blocks.len(), 4);
    assert_eq!(plan.days[1].blocks.len(), 3);
    assert!(plan.footer.ends_with("America/Chicago"));

    // blocks are painted in their calendar color next to the accent bar
    let block = &plan.days[0].blocks[0];
    let probe_x = u32::try_from(block.rect.x + block.rect.width as i32 - 2).expect("on canvas");
    let probe_y = u32::try_from(block.rect.y + block.rect.height as i32 - 2).expect("on canvas");
    assert_eq!(canvas.pixel(probe_x, probe_y), Some(block.fill));
    let accent_x = u32::try_from(block.rect.x + 1).expect("on canvas");
    assert_eq!(canvas.pixel(accent_x, probe_y), Some(Color::BLACK));

    let dir = tempdir().expect("tempdir");
    let cache = dir.path().join("last.png");
    save_png_atomic(&cache, canvas.image()).expect("cache");

    let panel_path = dir.path().join("panel.png");
    let mut panel = PngDisplay::new(&panel_path, 800, 480);
    panel.set_image(canvas.image()).expect("stage");
    panel.show().expect("show");

    assert_eq!(image::open(&cache).expect("cache png").width(), 1600);
    let shown = image::open(&panel_path).expect("panel png");
    assert_eq!((shown.width(), shown.height()), (800, 480));
}

#[test]
fn planning_is_independent_of_the_draw_target() {
    let cfg = demo_config();
    let tz = cfg.timezone;
    let now = tz
        .with_ymd_and_hms(2026, 2, 17, 7, 15, 0)
        .single()
        .expect("valid time");
    let intervals = ingest(build_demo_events(now, &tz), &tz);
    let today = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
    let agenda = Agenda::split(&intervals, today, &tz);
    let theme = Theme::from_config(&cfg);

    let first = plan_page(&agenda, &cfg, &theme, now);
    let second = plan_page(&agenda, &cfg, &theme, now);
    let rects = |plan: &dayboard_core::render::PagePlan| {
        plan.days
            .iter()
            .flat_map(|d| d.blocks.iter().map(|b| b.rect))
            .collect::<Vec<_>>()
    };
    assert_eq!(rects(&first), rects(&second));

    let mut canvas = Canvas::new(cfg.render_width, cfg.render_height, Color::WHITE);
    draw_page(&first, &theme, &mut canvas).expect("infallible");
}
