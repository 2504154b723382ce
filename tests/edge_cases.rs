//! Edge case and boundary condition tests for the monitor and configuration

use rs_metro::{
    Advance, ConfigError, Coordinates, FieldType, LayoutConfig, MonitorError, RouteMode,
    SimulationConfig, SimulationController, SimulationError, TrackMonitor, TrainConfig, TrainId,
    TunnelsGrid, METRO_HEIGHT, METRO_WIDTH,
};

fn c(row: usize, col: usize) -> Coordinates {
    Coordinates::new(row, col)
}

// ============================================================================
// Map Boundaries
// ============================================================================

#[test]
fn metro_map_dimensions() {
    let monitor = TrackMonitor::new(TunnelsGrid::metro());
    assert_eq!(monitor.width(), METRO_WIDTH);
    assert_eq!(monitor.height(), METRO_HEIGHT);
    assert!(monitor.contains(c(METRO_HEIGHT - 1, METRO_WIDTH - 1)));
    assert!(!monitor.contains(c(METRO_HEIGHT, 0)));
    assert!(!monitor.contains(c(0, METRO_WIDTH)));
    assert_eq!(monitor.get_field(c(METRO_HEIGHT, 0)), None);
}

#[test]
fn single_tile_map() {
    let monitor = TrackMonitor::new(TunnelsGrid::new(1, 1).unwrap());
    monitor.place_train(TrainId(1), &[c(0, 0)]).unwrap();
    assert_eq!(
        monitor.move_to_next_station(&[c(0, 0)], &[c(0, 1)], TrainId(1), true),
        Err(MonitorError::OutOfBounds { at: c(0, 1) })
    );
    // Moving onto the tile already held is a no-op commit
    assert_eq!(
        monitor.move_to_next_station(&[c(0, 0)], &[c(0, 0)], TrainId(1), true),
        Ok(Advance::Moved)
    );
    assert_eq!(monitor.cells_of(TrainId(1)), vec![c(0, 0)]);
}

#[test]
fn zero_width_map_rejected() {
    assert_eq!(TunnelsGrid::new(0, 3), Err(ConfigError::EmptyMap));
    assert_eq!(TunnelsGrid::new(3, 0), Err(ConfigError::EmptyMap));
}

// ============================================================================
// Windows
// ============================================================================

#[test]
fn empty_and_repeating_windows_are_malformed() {
    let monitor = TrackMonitor::new(TunnelsGrid::new(3, 1).unwrap());
    monitor.place_train(TrainId(1), &[c(0, 0)]).unwrap();

    assert_eq!(
        monitor.move_to_next_station(&[], &[c(0, 1)], TrainId(1), false),
        Err(MonitorError::MalformedWindow)
    );
    assert_eq!(
        monitor.move_to_next_station(&[c(0, 0)], &[c(0, 1), c(0, 1)], TrainId(1), false),
        Err(MonitorError::MalformedWindow)
    );
    assert_eq!(
        monitor.place_train(TrainId(2), &[c(0, 2), c(0, 2)]),
        Err(MonitorError::MalformedWindow)
    );
}

#[test]
fn rejected_move_changes_nothing() {
    let grid = TunnelsGrid::from_rows(&["...#"]).unwrap();
    let monitor = TrackMonitor::new(grid);
    monitor.place_train(TrainId(1), &[c(0, 2), c(0, 1)]).unwrap();
    let before = monitor.generation();

    assert_eq!(
        monitor.move_to_next_station(&[c(0, 2), c(0, 1)], &[c(0, 3), c(0, 2)], TrainId(1), true),
        Err(MonitorError::WallCell { at: c(0, 3) })
    );
    assert_eq!(monitor.cells_of(TrainId(1)), vec![c(0, 1), c(0, 2)]);
    assert_eq!(monitor.generation(), before);
}

#[test]
fn moving_a_window_the_train_does_not_hold() {
    let monitor = TrackMonitor::new(TunnelsGrid::new(4, 1).unwrap());
    monitor.place_train(TrainId(1), &[c(0, 0)]).unwrap();
    monitor.place_train(TrainId(2), &[c(0, 3)]).unwrap();

    assert_eq!(
        monitor.move_to_next_station(&[c(0, 3)], &[c(0, 2)], TrainId(1), false),
        Err(MonitorError::NotOwner {
            train: TrainId(1),
            at: c(0, 3)
        })
    );
    assert_eq!(
        monitor.move_to_next_station(&[c(0, 1)], &[c(0, 2)], TrainId(1), false),
        Err(MonitorError::NotOwner {
            train: TrainId(1),
            at: c(0, 1)
        })
    );
}

#[test]
fn train_cannot_be_placed_twice() {
    let monitor = TrackMonitor::new(TunnelsGrid::new(4, 1).unwrap());
    monitor.place_train(TrainId(1), &[c(0, 0)]).unwrap();
    assert_eq!(
        monitor.place_train(TrainId(1), &[c(0, 3)]),
        Err(MonitorError::AlreadyPlaced { train: TrainId(1) })
    );
}

// ============================================================================
// Painting
// ============================================================================

#[test]
fn painting_is_refused_while_a_unit_is_in_service() {
    let monitor = TrackMonitor::new(TunnelsGrid::new(2, 1).unwrap());
    let service = monitor.enter_service();
    assert_eq!(
        monitor.begin_painting().err(),
        Some(MonitorError::PaintingWhileActive { active: 1 })
    );
    drop(service);

    let mut painter = monitor.begin_painting().unwrap();
    assert_eq!(painter.set_field(c(0, 1), FieldType::Wall), Ok(FieldType::Empty));
    monitor.end_painting(painter);
    assert_eq!(monitor.get_field(c(0, 1)), Some(FieldType::Wall));
}

#[test]
fn overlapping_courses_fall_back_in_order() {
    let monitor = TrackMonitor::new(TunnelsGrid::new(2, 1).unwrap());
    let mut painter = monitor.begin_painting().unwrap();
    painter.begin_course(c(0, 0), TrainId(1)).unwrap();
    painter.begin_course(c(0, 0), TrainId(2)).unwrap();
    assert_eq!(painter.get_field(c(0, 0)), Some(FieldType::TrainPath(TrainId(2))));
    painter.end_course(c(0, 0), TrainId(2)).unwrap();
    assert_eq!(painter.get_field(c(0, 0)), Some(FieldType::TrainPath(TrainId(1))));
    painter.end_course(c(0, 0), TrainId(1)).unwrap();
    assert_eq!(painter.get_field(c(0, 0)), Some(FieldType::Empty));
    monitor.end_painting(painter);
    assert!(monitor.courses_through(c(0, 0)).is_empty());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn train_longer_than_route_is_rejected() {
    let config = SimulationConfig::empty()
        .with_layout(LayoutConfig::rows(&["..."]))
        .with_train_length(4)
        .with_train(TrainConfig::new(TrainId(1), "long").with_endpoints(c(0, 0), c(0, 2)));
    let err = SimulationController::new(config).err().unwrap();
    assert!(matches!(
        err,
        SimulationError::Config(ConfigError::RouteTooShort {
            train: TrainId(1),
            len: 3,
            wagons: 4
        })
    ));
}

#[test]
fn shuttle_filling_its_route_is_rejected() {
    let config = SimulationConfig::empty()
        .with_layout(LayoutConfig::rows(&["...."]))
        .with_train_length(3)
        .with_train(
            TrainConfig::new(TrainId(1), "wedged")
                .with_endpoints(c(0, 0), c(0, 2))
                .with_mode(RouteMode::Shuttle),
        );
    let err = SimulationController::new(config).err().unwrap();
    assert!(matches!(
        err,
        SimulationError::Config(ConfigError::ShuttleTooShort {
            train: TrainId(1),
            len: 3,
            wagons: 3
        })
    ));
}

#[test]
fn declared_train_count_must_match() {
    let config = SimulationConfig::empty()
        .with_layout(LayoutConfig::rows(&["..."]))
        .with_number_of_trains(2)
        .with_train(TrainConfig::new(TrainId(1), "only").with_endpoints(c(0, 0), c(0, 2)));
    assert_eq!(
        config.validate(),
        Err(ConfigError::TrainCount {
            declared: 2,
            listed: 1
        })
    );
}

#[test]
fn duplicate_and_unknown_train_ids() {
    let base = SimulationConfig::empty()
        .with_layout(LayoutConfig::rows(&["...", "..."]))
        .with_train_length(1)
        .with_train(TrainConfig::new(TrainId(1), "a").with_endpoints(c(0, 0), c(0, 2)));

    let duplicate = base
        .clone()
        .with_train(TrainConfig::new(TrainId(1), "b").with_endpoints(c(1, 0), c(1, 2)));
    assert_eq!(
        duplicate.validate(),
        Err(ConfigError::DuplicateTrain { train: TrainId(1) })
    );

    let unknown = base.with_start_order(vec![TrainId(7)]);
    assert_eq!(
        unknown.validate(),
        Err(ConfigError::BadStartOrder { train: TrainId(7) })
    );
}

#[test]
fn unreachable_destination() {
    let config = SimulationConfig::empty()
        .with_layout(LayoutConfig::rows(&["..#.."]))
        .with_train_length(1)
        .with_train(TrainConfig::new(TrainId(1), "cut off").with_endpoints(c(0, 0), c(0, 4)));
    assert_eq!(
        config.validate(),
        Err(ConfigError::Unreachable {
            train: TrainId(1),
            from: c(0, 0),
            to: c(0, 4)
        })
    );
}

#[test]
fn bad_layout_symbol() {
    let config = SimulationConfig::empty().with_layout(LayoutConfig::rows(&["..x"]));
    assert_eq!(
        config.validate(),
        Err(ConfigError::BadSymbol {
            at: c(0, 2),
            symbol: 'x'
        })
    );
}
