use clap::Parser;
use crossbeam::channel::{unbounded, Sender};
use stepseqrs::{
    cli::{parse_command, Args},
    logging,
    midi::{MidirInput, MidirOutput},
    Config, EngineMessage, EngineSettings, EventLoop, PatternMeta, Session, Status, StepGrid,
};
use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};

fn main() {
    let args = parse_command_line_arguments();
    let config = load_configuration(&args);
    initialize_logging(&config, args.verbose);

    let (meta, settings) = match config
        .pattern_meta("demo")
        .and_then(|meta| Ok((meta, config.engine_settings()?)))
    {
        Ok(parts) => parts,
        Err(e) => exit_with_error(&format!("Invalid configuration: {}", e)),
    };

    let grid = demo_grid(&meta);
    let mut session = Session::with_grid(meta, grid, settings.clone());
    connect_devices(&mut session, &config);
    session.set_record_armed(config.record);

    let (command_tx, command_rx) = unbounded();
    spawn_command_reader(command_tx);

    print_help(&settings);
    session.start(Instant::now());
    let mut event_loop = EventLoop::new(session, command_rx);
    match args.duration {
        Some(secs) if secs > 0.0 => event_loop.run_for(Duration::from_secs_f64(secs)),
        _ => event_loop.run(),
    }

    report_recording(&event_loop.into_session());
    log::info!("Application exiting");
}

fn parse_command_line_arguments() -> Args {
    Args::parse()
}

fn load_configuration(args: &Args) -> Config {
    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with_error(&format!("Error loading configuration: {}", e)),
    };
    config.apply_args(args);
    config
}

fn initialize_logging(config: &Config, verbose: bool) {
    if let Err(e) = logging::init_logger(config.log_dir.as_deref(), verbose) {
        eprintln!("Logging disabled: {}", e);
    }
    log::info!("Application starting");
}

fn exit_with_error(message: &str) -> ! {
    log::error!("{}", message);
    eprintln!("{}", message);
    std::process::exit(1);
}

/// Four-on-the-floor kick, backbeat snare and eighth-note hats.
fn demo_grid(meta: &PatternMeta) -> StepGrid {
    let mut grid = meta.empty_grid();
    let lane = |grid: &StepGrid, note: u8| grid.lane_for_note(note);
    let Some(per_beat) = meta.steps_per_beat() else {
        return grid;
    };
    let (kick, snare, hat) = (lane(&grid, 36), lane(&grid, 38), lane(&grid, 42));
    for beat_start in (0..meta.steps).step_by(per_beat) {
        let beat = beat_start / per_beat;
        if let Some(kick) = kick {
            grid.set_level(kick, beat_start, if beat % 4 == 0 { 3 } else { 2 });
        }
        if let (Some(snare), true) = (snare, beat % 2 == 1) {
            grid.set_level(snare, beat_start, 3);
        }
        if let Some(hat) = hat {
            grid.set_level(hat, beat_start, 2);
            if per_beat % 2 == 0 {
                grid.set_level(hat, beat_start + per_beat / 2, 1);
            }
        }
    }
    grid
}

fn connect_devices(session: &mut Session, config: &Config) {
    match &config.midi_output {
        Some(name) => match MidirOutput::connect(name) {
            Ok(output) => {
                println!("Sending to MIDI output: {}", output.port_name());
                session.attach_output(Box::new(output));
            }
            Err(e) => {
                log::warn!("{}", e);
                eprintln!("{}; playing silently", e);
                session.report(Status::OutputUnavailable);
            }
        },
        None => {
            log::info!("No MIDI output configured, playing silently");
            session.report(Status::OutputUnavailable);
        }
    }

    if let Some(name) = &config.midi_input {
        match MidirInput::connect(name) {
            Ok(input) => {
                println!("Recording from MIDI input: {}", input.port_name());
                session.attach_input(Box::new(input));
            }
            Err(e) => {
                log::warn!("{}", e);
                eprintln!("{}; live recording disabled", e);
                session.report(Status::InputUnavailable);
            }
        }
    }
}

fn spawn_command_reader(command_tx: Sender<EngineMessage>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_command(&line) {
                Some(message) => {
                    if command_tx.send(message).is_err() {
                        break;
                    }
                }
                None if !line.trim().is_empty() => println!("Unknown command: {}", line.trim()),
                None => {}
            }
        }
        log::debug!("Command reader finished");
    });
}

fn print_help(settings: &EngineSettings) {
    println!("Commands: p play/stop, s stop, r record arm, m metronome, b loop scope,");
    println!("          a input accent, t <bpm> tempo, q quit");
    log::debug!("Engine settings: {:?}", settings);
}

fn report_recording(session: &Session) {
    let events = session.export_events();
    for event in &events {
        log::debug!("{:?}", event);
    }
    log::info!(
        "Session ended with {} hits ({} exchange events), modified: {}",
        session.grid().hit_count(),
        events.len(),
        session.is_modified()
    );
    println!(
        "{} hits in the grid, {} exchange events{}",
        session.grid().hit_count(),
        events.len(),
        if session.is_modified() { " (modified)" } else { "" }
    );
}
