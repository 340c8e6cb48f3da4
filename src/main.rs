use std::io::{self, BufRead, Write};

use genseq::{midi_note_name, MidirRegistry, ScaleType, Sequencer, SequencerEvent};

fn main() {
    env_logger::init();

    let registry = MidirRegistry::new("genseq");
    let sequencer = Sequencer::new(Box::new(registry));

    // Pick the first destination by default, like plugging straight into
    // whatever synth is available.
    let destinations = sequencer.destinations();
    if let Some(first) = destinations.first() {
        if let Err(e) = sequencer.select_destination(&first.id) {
            eprintln!("Could not open {}: {}", first.name, e);
        }
    } else {
        println!("No MIDI destinations found - running silently.");
    }

    print_help();
    print_status(&sequencer);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        let arg = parts.next();

        match command {
            "" => {}
            "start" => sequencer.start(),
            "stop" => sequencer.stop(),
            "tempo" => match arg.and_then(|a| a.parse::<f32>().ok()) {
                Some(bpm) => sequencer.set_tempo(bpm),
                None => println!("usage: tempo <bpm>"),
            },
            "scale" => match arg.and_then(parse_scale) {
                Some(scale) => sequencer.set_scale(scale),
                None => println!("scales: major, minor, majpent, minpent"),
            },
            "octave" => match arg.and_then(|a| a.parse::<i32>().ok()) {
                Some(octave) => sequencer.set_base_octave(octave),
                None => println!("usage: octave <2-6>"),
            },
            "ports" => print_ports(&sequencer),
            "use" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(index) => select_port(&sequencer, index),
                None => println!("usage: use <port number>"),
            },
            "release" => sequencer.clear_destination(),
            "status" => print_status(&sequencer),
            "help" => print_help(),
            "quit" | "exit" => break,
            other => println!("unknown command: {} (try 'help')", other),
        }

        for event in sequencer.poll_events() {
            match event {
                SequencerEvent::Started => println!("running"),
                SequencerEvent::Stopped => println!("stopped"),
                SequencerEvent::Note(pitch) => {
                    println!("note {} ({})", pitch, midi_note_name(pitch))
                }
                SequencerEvent::TempoChanged(bpm) => println!("tempo {} BPM", bpm),
                SequencerEvent::DestinationChanged(name) => println!("output -> {}", name),
            }
        }

        print!("> ");
        let _ = io::stdout().flush();
    }

    // Dropping the sequencer stops the engine and silences the device.
    sequencer.stop();
}

fn parse_scale(name: &str) -> Option<ScaleType> {
    match name {
        "major" => Some(ScaleType::Major),
        "minor" => Some(ScaleType::NaturalMinor),
        "majpent" => Some(ScaleType::MajorPentatonic),
        "minpent" => Some(ScaleType::MinorPentatonic),
        _ => None,
    }
}

fn print_ports(sequencer: &Sequencer) {
    let destinations = sequencer.destinations();
    if destinations.is_empty() {
        println!("no MIDI destinations found");
        return;
    }
    for (index, dest) in destinations.iter().enumerate() {
        println!("  [{}] {}", index, dest.name);
    }
}

fn select_port(sequencer: &Sequencer, index: usize) {
    let destinations = sequencer.destinations();
    match destinations.get(index) {
        Some(dest) => {
            if let Err(e) = sequencer.select_destination(&dest.id) {
                println!("could not select {}: {}", dest.name, e);
            }
        }
        None => println!("no port {} (try 'ports')", index),
    }
}

fn print_status(sequencer: &Sequencer) {
    let config = sequencer.config();
    println!(
        "{} | {} BPM | {} | octave {} | output: {}",
        if sequencer.is_running() { "running" } else { "stopped" },
        sequencer.tempo(),
        config.scale().name(),
        config.base_octave(),
        sequencer.destination_label().unwrap_or_else(|| "(none)".to_string()),
    );
}

fn print_help() {
    println!("commands:");
    println!("  start / stop          run or halt the sequencer");
    println!("  tempo <bpm>           set tempo (60-240)");
    println!("  scale <name>          major, minor, majpent, minpent");
    println!("  octave <n>            base octave (2-6)");
    println!("  ports / use <n>       list or select a MIDI output");
    println!("  release               deselect the MIDI output");
    println!("  status / help / quit");
}
