use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use citemark::fixture::FixtureDocument;
use citemark::highlight::{
    AttemptFailure, Command, FragmentSource, HighlightEvent, HighlightState, Matcher,
    OverlayManager, OverlayStyle, PageFragmentSet, Phase, Rect, RetryPolicy, Scheduler,
    TextFragment, ViewState, resolve,
};
use citemark::test_utils::test_helpers::{PageBuilder, RecordingSurface};

type Pages = HashMap<usize, Arc<PageFragmentSet>>;

fn scheduler() -> Scheduler<RecordingSurface> {
    Scheduler::new(
        RetryPolicy::default(),
        OverlayManager::new(RecordingSurface::new(), OverlayStyle::default()),
    )
}

/// Poll at every deadline until the scheduler has nothing left to do
fn run_to_completion<F: FragmentSource>(
    scheduler: &mut Scheduler<RecordingSurface>,
    source: &F,
    mut now: Instant,
) -> Instant {
    while let Some(due) = scheduler.next_deadline() {
        now = due;
        scheduler.poll(now, source);
    }
    now
}

fn approx_eq(a: Rect, b: Rect) -> bool {
    let close = |x: f32, y: f32| (x - y).abs() < 1e-3;
    close(a.x, b.x) && close(a.y, b.y) && close(a.width, b.width) && close(a.height, b.height)
}

#[test]
fn split_citation_is_marked_with_union_box() {
    let page = PageBuilder::new(3)
        .origin(Rect::new(40.0, 900.0, 612.0, 792.0))
        .fragments(&["Group", "EBITDA", " of USD", " 2.3bn", " for Q2"])
        .build();
    let mut pages = Pages::new();
    pages.insert(3, page.clone());

    let mut state = HighlightState::with_page_count(20);
    let mut s = scheduler();
    let t0 = Instant::now();

    let request = state.highlight_text(3, "EBITDA of USD 2.3bn").unwrap();
    s.apply(request, t0, &pages);
    run_to_completion(&mut s, &pages, t0);

    assert_eq!(s.phase(), Phase::Matched);

    let run = &page.fragments[1..4];
    let expected = resolve(run, page.origin).unwrap();
    let shown = s.overlay().current().unwrap();
    assert_eq!(shown.page, 3);
    assert_eq!(shown.rect, expected);
    // "Group" starts at x=72; "EBITDA" follows 5 chars * 6px later
    assert_eq!(expected, Rect::new(102.0, 72.0, 114.0, 12.0));

    let events: Vec<_> = s.events().drain().collect();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        HighlightEvent::Matched { page: 3, attempts: 1, .. }
    ));
}

#[test]
fn exact_fragment_match_ignores_surroundings() {
    let mut builder = PageBuilder::new(2);
    for i in 0..200 {
        builder = builder.fragment(&format!("filler {i} "), 30.0);
        if i % 10 == 9 {
            builder = builder.newline();
        }
    }
    let page = builder.fragment("  Gain on Sale  ", 90.0).build();

    let result = Matcher::default().find("gain on sale", &page.fragments);
    let run = result.fragments().unwrap();
    assert_eq!(run.len(), 1);
    assert_eq!(run[0].content, "  Gain on Sale  ");
}

#[test]
fn never_populated_page_exhausts_once() {
    let mut pages = Pages::new();
    pages.insert(5, PageBuilder::new(5).build());

    let mut s = scheduler();
    let t0 = Instant::now();
    let mut state = HighlightState::new();
    let request = state
        .highlight_text(5, "Gain on sale of non-current assets")
        .unwrap();
    s.apply(request, t0, &pages);

    let finished = run_to_completion(&mut s, &pages, t0);

    assert_eq!(s.phase(), Phase::Exhausted);
    assert_eq!(finished, t0 + Duration::from_millis(100 + 5 * 200));
    assert!(s.overlay().surface().ops().is_empty());

    let events: Vec<_> = s.events().drain().collect();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        HighlightEvent::Exhausted {
            page: 5,
            attempts: 6,
            reason: AttemptFailure::FragmentsUnavailable,
            ..
        }
    ));
}

#[test]
fn text_missing_from_rendered_page_reports_no_match() {
    let mut pages = Pages::new();
    pages.insert(5, PageBuilder::new(5).fragments(&["Revenue", " 13.1bn"]).build());

    let mut s = scheduler();
    let t0 = Instant::now();
    let mut state = HighlightState::new();
    s.apply(state.highlight_text(5, "EBIT margin").unwrap(), t0, &pages);
    run_to_completion(&mut s, &pages, t0);

    let event = s.events().try_recv().unwrap();
    assert!(matches!(
        event,
        HighlightEvent::Exhausted {
            reason: AttemptFailure::NoMatch,
            ..
        }
    ));
    assert!(s.overlay().current().is_none());
}

#[test]
fn superseded_request_never_touches_overlay() {
    let mut pages = Pages::new();
    let mut s = scheduler();
    let mut state = HighlightState::new();
    let t0 = Instant::now();

    let first = state.highlight_text(3, "EBITDA").unwrap();
    let Command::Request(ref old) = first else {
        panic!("expected request");
    };
    let old_id = old.id;
    s.apply(first, t0, &pages);

    // first attempt fails, a retry is now pending for the old request
    s.poll(t0 + Duration::from_millis(100), &pages);
    assert!(s.next_deadline().is_some());

    pages.insert(3, PageBuilder::new(3).fragments(&["EBITDA"]).build());
    pages.insert(7, PageBuilder::new(7).fragments(&["Free cash flow"]).build());
    let second = state.highlight_text(7, "free cash flow").unwrap();
    s.apply(second, t0 + Duration::from_millis(150), &pages);

    run_to_completion(&mut s, &pages, t0 + Duration::from_millis(150));

    let surface = s.overlay().surface();
    assert_eq!(surface.ops_for(old_id), 0);
    assert_eq!(surface.draws().len(), 1);
    assert_eq!(surface.visible().len(), 1);
    assert_eq!(surface.visible()[0].page, 7);
}

#[test]
fn switching_requests_after_match_leaves_one_overlay() {
    let mut pages = Pages::new();
    pages.insert(3, PageBuilder::new(3).fragments(&["EBITDA"]).build());
    pages.insert(15, PageBuilder::new(15).fragments(&["Gain on sale"]).build());

    let mut s = scheduler();
    let mut state = HighlightState::new();
    let t0 = Instant::now();

    s.apply(state.highlight_text(3, "ebitda").unwrap(), t0, &pages);
    let t1 = run_to_completion(&mut s, &pages, t0);
    s.apply(state.highlight_text(15, "gain on sale").unwrap(), t1, &pages);

    // the old marker is gone as soon as the new request arrives
    assert!(s.overlay().surface().visible().is_empty());

    run_to_completion(&mut s, &pages, t1);
    let visible = s.overlay().surface().visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].page, 15);
}

#[test]
fn zoom_recomputes_rectangle_at_new_scale() {
    let yaml = r#"
page_count: 20
pages:
  - page: 3
    origin: { x: 0, y: 0, width: 612, height: 792 }
    render_delay_ms: 50
    fragments:
      - { content: "EBITDA", box: { x: 72, y: 100, width: 40, height: 12 } }
      - { content: " of USD", box: { x: 112, y: 100, width: 38, height: 12 } }
      - { content: " 2.3bn", box: { x: 150, y: 100, width: 30, height: 12 } }
"#;
    let mut doc = FixtureDocument::from_yaml_str(yaml).unwrap();
    let view = ViewState::new(1.2, 3);
    let mut s = scheduler().with_view(view);
    let mut state = HighlightState::with_page_count(doc.page_count());

    let t0 = Instant::now();
    doc.set_scale(1.2, t0);
    doc.start_rendering(t0);
    s.apply(state.highlight_text(3, "EBITDA of USD 2.3bn").unwrap(), t0, &doc);

    // initial attempt at +100ms finds the page rendered at +50ms
    assert!(doc.advance(t0 + Duration::from_millis(50)).contains(&3));
    let t1 = run_to_completion(&mut s, &doc, t0);
    assert_eq!(s.phase(), Phase::Matched);
    let at_1_2 = s.overlay().current().unwrap().rect;
    assert!(approx_eq(at_1_2, Rect::new(72.0, 100.0, 108.0, 12.0).scaled(1.2)));

    // zoom: the backend re-renders, the scheduler starts over
    doc.set_scale(1.4, t1);
    s.apply(Command::ViewChanged(view.with_scale(1.4)), t1, &doc);
    assert_eq!(s.phase(), Phase::Attempting { attempt: 0 });
    assert!(s.overlay().current().is_none());

    let t2 = t1 + Duration::from_millis(50);
    for page in doc.advance(t2) {
        s.apply(Command::PageRendered(page), t2, &doc);
    }
    assert_eq!(s.phase(), Phase::Matched);

    let at_1_4 = s.overlay().current().unwrap().rect;
    assert!(approx_eq(at_1_4, at_1_2.scaled(1.4 / 1.2)));
    assert_eq!(s.events().drain().count(), 2);
}

#[test]
fn rerender_of_matched_page_refreshes_geometry() {
    let mut pages = Pages::new();
    pages.insert(4, PageBuilder::new(4).fragments(&["Net", " profit"]).build());

    let mut s = scheduler();
    let mut state = HighlightState::new();
    let t0 = Instant::now();
    s.apply(state.highlight_text(4, "net profit").unwrap(), t0, &pages);
    let t1 = run_to_completion(&mut s, &pages, t0);
    let before = s.overlay().current().unwrap().rect;

    pages.insert(
        4,
        PageBuilder::new(4)
            .origin(Rect::new(0.0, 10.0, 612.0, 792.0))
            .scale(1.0)
            .newline()
            .fragments(&["Net", " profit"])
            .build(),
    );
    s.apply(Command::PageRendered(4), t1, &pages);

    let after = s.overlay().current().unwrap().rect;
    assert_eq!(s.phase(), Phase::Matched);
    assert_eq!(after.y, before.y + 14.0);
    assert_eq!(s.overlay().surface().visible().len(), 1);
}

#[test]
fn rerender_after_exhaustion_starts_fresh_cycle() {
    let mut pages = Pages::new();
    let mut s = scheduler();
    let mut state = HighlightState::new();
    let t0 = Instant::now();

    s.apply(state.highlight_text(7, "net profit").unwrap(), t0, &pages);
    let t1 = run_to_completion(&mut s, &pages, t0);
    assert_eq!(s.phase(), Phase::Exhausted);

    pages.insert(7, PageBuilder::new(7).fragments(&["Net", " profit"]).build());
    s.apply(Command::PageRendered(7), t1, &pages);

    assert_eq!(s.phase(), Phase::Matched);
    assert!(s.next_deadline().is_none());
    assert_eq!(s.overlay().surface().visible().len(), 1);

    let events: Vec<_> = s.events().drain().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        HighlightEvent::Exhausted { page: 7, attempts: 6, .. }
    ));
    // the new cycle has its own budget, so the match counts as its first attempt
    assert!(matches!(
        events[1],
        HighlightEvent::Matched { page: 7, attempts: 1, .. }
    ));
}

#[test]
fn rerender_after_exhaustion_can_exhaust_again() {
    let mut pages = Pages::new();
    let mut s = scheduler();
    let mut state = HighlightState::new();
    let t0 = Instant::now();

    s.apply(state.highlight_text(7, "net profit").unwrap(), t0, &pages);
    let t1 = run_to_completion(&mut s, &pages, t0);

    pages.insert(7, PageBuilder::new(7).fragments(&["Gross", " margin"]).build());
    s.apply(Command::PageRendered(7), t1, &pages);
    assert_eq!(s.phase(), Phase::Attempting { attempt: 1 });

    let t2 = run_to_completion(&mut s, &pages, t1);
    assert_eq!(s.phase(), Phase::Exhausted);
    assert_eq!(t2, t1 + Duration::from_millis(5 * 200));

    let events: Vec<_> = s.events().drain().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[1],
        HighlightEvent::Exhausted {
            attempts: 6,
            reason: AttemptFailure::NoMatch,
            ..
        }
    ));
}

#[test]
fn window_bound_holds_on_large_page() {
    let fragments: Vec<TextFragment> = (0..1000)
        .map(|i| TextFragment::new("ab", Rect::new(i as f32, 0.0, 1.0, 1.0)))
        .collect();
    let matcher = Matcher::default();

    let (result, stats) = matcher.find_with_stats("zzzz", &fragments);

    assert!(!result.is_found());
    // 1000 single-fragment checks, then runs cut off past 8 chars (5 fragments)
    assert!(stats.widest_window <= 5);
    assert!(stats.longest_accumulation <= 10);
    assert!(stats.comparisons <= 1000 + 1000 * 5);
}

#[test]
fn window_never_exceeds_ten_fragments() {
    let fragments: Vec<TextFragment> = (0..1000)
        .map(|_| TextFragment::new("a", Rect::new(0.0, 0.0, 1.0, 1.0)))
        .collect();
    let target = "b".repeat(40);

    let (result, stats) = Matcher::default().find_with_stats(&target, &fragments);

    assert!(!result.is_found());
    assert_eq!(stats.widest_window, 10);
    assert!(stats.comparisons <= 1000 + 1000 * 10);
}

#[test]
fn resolved_rectangle_contains_every_fragment() {
    let page = PageBuilder::new(1)
        .origin(Rect::new(25.0, 60.0, 612.0, 792.0))
        .fragments(&["Gain on", " sale of"])
        .newline()
        .fragments(&["non-current", " assets"])
        .build();

    let rect = resolve(&page.fragments, page.origin).unwrap();
    let absolute = Rect::new(
        rect.x + page.origin.x,
        rect.y + page.origin.y,
        rect.width,
        rect.height,
    );
    for fragment in page.fragments.iter() {
        assert!(absolute.contains(&fragment.bounds));
    }
}

#[test]
fn clear_after_match_removes_marker() {
    let mut pages = Pages::new();
    pages.insert(1, PageBuilder::new(1).fragments(&["Revenue"]).build());

    let mut s = scheduler();
    let mut state = HighlightState::new();
    let t0 = Instant::now();
    s.apply(state.highlight_text(1, "revenue").unwrap(), t0, &pages);
    let t1 = run_to_completion(&mut s, &pages, t0);

    s.apply(state.clear(), t1, &pages);
    s.apply(state.clear(), t1, &pages);

    assert_eq!(s.phase(), Phase::Idle);
    assert!(s.overlay().surface().visible().is_empty());
    assert!(s.active().is_none());
}

#[test]
fn demo_fixture_locates_citations() {
    let mut doc =
        FixtureDocument::load(std::path::Path::new("demos/interim_report.yaml")).unwrap();
    assert_eq!(doc.page_count(), 20);

    let mut s = scheduler();
    let mut state = HighlightState::with_page_count(doc.page_count());
    let t0 = Instant::now();
    doc.start_rendering(t0);
    s.apply(state.highlight_text(3, "EBITDA of USD 2.3bn").unwrap(), t0, &doc);

    // page 3 renders at +300ms, after the first attempt has already failed
    let mut now = t0;
    while s.phase() != Phase::Matched {
        let next = [s.next_deadline(), doc.next_render_at()]
            .into_iter()
            .flatten()
            .min()
            .expect("scheduler stalled");
        now = next;
        for page in doc.advance(now) {
            s.apply(Command::PageRendered(page), now, &doc);
        }
        s.poll(now, &doc);
    }

    assert_eq!(now, t0 + Duration::from_millis(300));
    let region = s.overlay().current().unwrap();
    assert_eq!(region.page, 3);
    assert!(approx_eq(
        region.rect,
        Rect::new(282.0, 100.0, 122.0, 12.0).scaled(ViewState::DEFAULT_SCALE)
    ));
}
