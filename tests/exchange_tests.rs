use stepseqrs::exchange::{
    events_to_grid, events_to_grid_with_layout, grid_to_events, DrumEvent, EventKind,
};
use stepseqrs::PatternMeta;

fn busy_grid(meta: &PatternMeta) -> stepseqrs::StepGrid {
    let mut grid = meta.empty_grid();
    for step in 0..meta.steps {
        if step % 4 == 0 {
            grid.set_level(7, step, 3);
        }
        if step % 8 == 4 {
            grid.set_level(6, step, 2);
        }
        grid.set_level(5, step, if step % 2 == 0 { 2 } else { 1 });
    }
    grid
}

#[test]
fn test_round_trip_preserves_grid_for_every_length() {
    for steps in [24, 32, 48] {
        let meta = PatternMeta::new("round", 120.0, steps);
        let grid = busy_grid(&meta);
        let events = grid_to_events(&grid, &meta, &[]);
        let (back, leftover) = events_to_grid(&events, &meta);
        assert_eq!(back.signature(), grid.signature(), "{} steps", steps);
        assert!(leftover.is_empty(), "{} steps", steps);
        assert_eq!(grid_to_events(&back, &meta, &leftover), events);
    }
}

#[test]
fn test_round_trip_respects_loop_start() {
    let meta = PatternMeta {
        loop_start_tick: 1920,
        ..PatternMeta::new("offset", 120.0, 32)
    };
    let mut grid = meta.empty_grid();
    grid.set_level(7, 0, 3);
    grid.set_level(6, 31, 1);
    let events = grid_to_events(&grid, &meta, &[]);
    assert_eq!(events[0].tick, 1920);
    let (back, _) = events_to_grid(&events, &meta);
    assert_eq!(back, grid);
}

#[test]
fn test_ticks_round_to_nearest_step() {
    let meta = PatternMeta::new("round", 120.0, 32);
    // 120 ticks per step.
    let events = vec![
        DrumEvent::on(59, 9, 36, 100),
        DrumEvent::on(61, 9, 38, 100),
        DrumEvent::on(3779, 9, 42, 100),
    ];
    let (grid, leftover) = events_to_grid(&events, &meta);
    assert!(grid.cell(7, 0).is_some_and(|c| c.on));
    assert!(grid.cell(6, 1).is_some_and(|c| c.on));
    assert!(grid.cell(5, 31).is_some_and(|c| c.on));
    assert!(leftover.is_empty());
}

#[test]
fn test_unplaceable_events_are_left_over() {
    let meta = PatternMeta::new("leftover", 120.0, 32);
    let events = vec![
        DrumEvent::on(0, 0, 36, 100),
        DrumEvent::on(0, 9, 70, 100),
        DrumEvent::on(0, 9, 36, 0),
        DrumEvent::off(0, 9, 36),
        DrumEvent::on(3900, 9, 36, 100),
        DrumEvent::on(-200, 9, 36, 100),
    ];
    let (grid, leftover) = events_to_grid(&events, &meta);
    assert!(grid.is_empty());
    assert_eq!(leftover, events);
}

#[test]
fn test_leftovers_are_merged_back_in_tick_order() {
    let meta = PatternMeta::new("merge", 120.0, 32);
    let foreign = vec![DrumEvent::on(130, 3, 60, 90), DrumEvent::off(250, 3, 60)];
    let mut grid = meta.empty_grid();
    grid.set_level(7, 1, 1);

    let events = grid_to_events(&grid, &meta, &foreign);
    let ticks: Vec<i64> = events.iter().map(|e| e.tick).collect();
    assert_eq!(ticks, vec![120, 130, 250, 360]);
    assert_eq!(events[0], DrumEvent::on(120, 9, 36, 48));
}

#[test]
fn test_reimport_with_recorded_layout() {
    let meta = PatternMeta::new("layout", 120.0, 32);
    let mut grid = meta.empty_grid();
    let lane = grid.ensure_lane_for_note(49).unwrap();
    grid.set_level(lane, 8, 3);
    let events = grid_to_events(&grid, &meta, &[]);

    let (default_layout, leftover) = events_to_grid(&events, &meta);
    assert!(default_layout.is_empty());
    assert!(leftover.iter().any(|e| e.note == 49 && e.kind == EventKind::On));

    let (back, _) = events_to_grid_with_layout(&events, &meta, grid.layout().as_slice());
    assert_eq!(back, grid);
}
