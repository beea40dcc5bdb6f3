use std::time::Duration;

use anyhow::Context;
use grblkit::{
    init_logging, list_ports, ConnectionParams, GcodeStreamer, GcodeStreamerConfig,
    GrblController, GrblControllerConfig,
};

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => show_ports(),
        [port] => show_status(port),
        [port, file] => stream_file(port, file),
        _ => {
            eprintln!("usage: grblkit [<port> [<gcode-file>]]");
            std::process::exit(2);
        }
    }
}

/// List CNC-looking serial ports
fn show_ports() -> anyhow::Result<()> {
    let ports = list_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("No CNC serial ports found");
        return Ok(());
    }
    for port in ports {
        println!("{}\t{}", port.port_name, port.description);
    }
    Ok(())
}

/// Connect, print the banner and a few status snapshots, disconnect
fn show_status(port: &str) -> anyhow::Result<()> {
    let controller = GrblController::serial(GrblControllerConfig::default());
    let banner = controller
        .connect(&ConnectionParams::new(port, 115_200))
        .with_context(|| format!("connecting to {}", port))?;
    println!("{} {}{}", banner.firmware, banner.version, banner.message);

    // Give the poller time to pick up a couple of status reports.
    std::thread::sleep(Duration::from_secs(2));
    let status = controller.device_status();
    let report = status.report();
    println!("state: {}", report.state);
    if let Some(mpos) = report.mpos {
        println!("mpos:  {}", mpos);
    }

    drain_monitor(&controller);
    controller.disconnect()?;
    Ok(())
}

/// Connect and stream a G-code file to completion
fn stream_file(port: &str, file: &str) -> anyhow::Result<()> {
    let controller = GrblController::serial(GrblControllerConfig::default());
    let banner = controller
        .connect(&ConnectionParams::new(port, 115_200))
        .with_context(|| format!("connecting to {}", port))?;
    println!("{} {}{}", banner.firmware, banner.version, banner.message);

    let streamer = GcodeStreamer::new(controller.clone(), file, GcodeStreamerConfig::default());
    streamer.start().with_context(|| format!("opening {}", file))?;

    loop {
        drain_monitor(&controller);

        if controller.failed() {
            eprintln!("{}", controller.fault_message());
            eprintln!("Stream paused; resolve the fault on the machine");
            streamer.stop();
            break;
        }
        if !controller.is_connected() {
            eprintln!("Connection lost");
            break;
        }
        if streamer.is_finished()
            && controller.pending_commands() == 0
            && controller.in_flight_commands() == 0
        {
            let (sent, total) = streamer.progress();
            println!("Done: {}/{} lines", sent, total);
            break;
        }

        std::thread::sleep(Duration::from_millis(200));
    }

    controller.disconnect()?;
    Ok(())
}

/// Print queued monitor lines to stdout
fn drain_monitor(controller: &GrblController) {
    let monitor = controller.monitor();
    while monitor.has_logs() {
        println!("{}", monitor.next_log());
    }
}
