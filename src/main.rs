use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use serde_json::json;
use simplelog::{Config, LevelFilter, WriteLogger};

use citemark::fixture::FixtureDocument;
use citemark::highlight::{
    Command, HighlightEvent, HighlightState, OverlayManager, OverlayRegion, OverlayStyle,
    OverlaySurface, Scheduler, ViewState,
};
use citemark::{panic_handler, settings};

/// Locate a citation on a rendered page and report where its marker goes
#[derive(Parser, Debug)]
#[command(name = "citemark", version, about)]
struct Args {
    /// Fixture document (YAML or JSON) describing the rendered pages
    fixture: PathBuf,

    /// Page to search (1-indexed)
    #[arg(short, long)]
    page: usize,

    /// Citation text to locate
    #[arg(short, long)]
    text: String,

    /// Initial render scale
    #[arg(long, default_value_t = ViewState::DEFAULT_SCALE)]
    scale: f32,

    /// Zoom to this scale once located, and locate again
    #[arg(long)]
    zoom: Option<f32>,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "citemark.log")]
    log_file: PathBuf,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

/// Prints overlay mutations as JSON lines
struct JsonLinesSurface;

impl JsonLinesSurface {
    fn emit(value: serde_json::Value) {
        Self::write_line(&mut io::stdout().lock(), &value);
    }

    /// Returns false if the line could not be written
    fn write_line(out: &mut impl Write, value: &serde_json::Value) -> bool {
        match writeln!(out, "{value}") {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write output line: {e}");
                false
            }
        }
    }
}

impl OverlaySurface for JsonLinesSurface {
    fn draw(&mut self, region: &OverlayRegion, style: &OverlayStyle) {
        Self::emit(json!({ "op": "draw", "region": region, "style": style }));
    }

    fn erase(&mut self, region: &OverlayRegion) {
        Self::emit(json!({ "op": "erase", "region": region }));
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("cannot create log file {:?}", args.log_file))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting citemark");

    match &args.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }

    let mut doc = FixtureDocument::load(&args.fixture)
        .with_context(|| format!("cannot load fixture {:?}", args.fixture))?;

    let mut state = HighlightState::with_page_count(doc.page_count());
    let request = state
        .highlight_text(args.page, args.text.as_str())
        .context("invalid highlight request")?;

    let view = ViewState::new(args.scale, args.page);
    let overlay = OverlayManager::new(JsonLinesSurface, settings::get_overlay_style());
    let mut scheduler = Scheduler::new(settings::get_retry_policy(), overlay).with_view(view);

    let outcome = locate(&mut scheduler, &mut doc, request, view, args.zoom);

    scheduler.apply(state.clear(), Instant::now(), &doc);
    info!("Shutting down citemark");

    Ok(match outcome {
        Some(HighlightEvent::Matched { .. }) => ExitCode::SUCCESS,
        Some(HighlightEvent::Exhausted { .. }) => ExitCode::from(2),
        None => {
            warn!("Locate cycle ended without an outcome");
            ExitCode::FAILURE
        }
    })
}

/// Place the marker, then optionally zoom and place it again
fn locate(
    scheduler: &mut Scheduler<JsonLinesSurface>,
    doc: &mut FixtureDocument,
    request: Command,
    view: ViewState,
    zoom: Option<f32>,
) -> Option<HighlightEvent> {
    let now = Instant::now();
    doc.set_scale(view.scale, now);
    doc.start_rendering(now);
    scheduler.apply(request, now, &*doc);

    let outcome = drive(scheduler, doc);

    let (Some(zoom), Some(HighlightEvent::Matched { .. })) = (zoom, &outcome) else {
        return outcome;
    };
    let zoomed = view.with_scale(zoom);
    if zoomed == view {
        debug!("Zoom {zoom} keeps scale {:.2}, marker stays", view.scale);
        return outcome;
    }

    let now = Instant::now();
    info!("Zooming to {:.2}", zoomed.scale);
    doc.set_scale(zoomed.scale, now);
    scheduler.apply(Command::ViewChanged(zoomed), now, &*doc);
    drive(scheduler, doc).or(outcome)
}

/// Run renders and retries in real time until the scheduler reports an outcome
fn drive(
    scheduler: &mut Scheduler<JsonLinesSurface>,
    doc: &mut FixtureDocument,
) -> Option<HighlightEvent> {
    loop {
        let now = Instant::now();
        for page in doc.advance(now) {
            scheduler.apply(Command::PageRendered(page), now, &*doc);
        }
        scheduler.poll(now, &*doc);

        if let Ok(event) = scheduler.events().try_recv() {
            JsonLinesSurface::emit(event_json(&event));
            return Some(event);
        }

        let next = [scheduler.next_deadline(), doc.next_render_at()]
            .into_iter()
            .flatten()
            .min()?;
        std::thread::sleep(next.saturating_duration_since(Instant::now()));
    }
}

fn event_json(event: &HighlightEvent) -> serde_json::Value {
    match event {
        HighlightEvent::Matched {
            request,
            page,
            rect,
            attempts,
        } => json!({
            "event": "matched",
            "request": request,
            "page": page,
            "rect": rect,
            "attempts": attempts,
        }),
        HighlightEvent::Exhausted {
            request,
            page,
            attempts,
            reason,
        } => json!({
            "event": "exhausted",
            "request": request,
            "page": page,
            "attempts": attempts,
            "reason": reason.to_string(),
        }),
    }
}
